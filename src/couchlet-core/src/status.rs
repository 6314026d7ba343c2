use std::borrow::Cow;

/// Human-readable description for an HTTP failure status.
///
/// Well-known client and server error codes get a canned message, anything
/// else falls back to `"Status code: N"`.
pub fn describe_status(code: u16) -> Cow<'static, str> {
    match known_status(code) {
        Some(message) => Cow::Borrowed(message),
        None => Cow::Owned(format!("Status code: {}", code)),
    }
}

fn known_status(code: u16) -> Option<&'static str> {
    let message = match code {
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Request Entity Too Large",
        414 => "Request-URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Requested Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a teapot",
        422 => "Unprocessable Entity",
        423 => "Locked",
        424 => "Failed Dependency",
        425 => "Unordered Collection",
        426 => "Upgrade Required",
        // Non-standard / vendor codes
        444 => "No Response",
        449 => "Retry With",
        450 => "Blocked by Windows Parental Controls",
        499 => "Client Closed Request",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        506 => "Variant Also Negotiates",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        509 => "Bandwidth Limit Exceeded",
        510 => "Not Extended",
        _ => return None,
    };
    Some(message)
}
