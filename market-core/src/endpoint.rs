use url::Url;

use crate::constants::STREAM_PATH;
use crate::error::EndpointError;

/// Строит URL push-эндпоинта из origin страницы/сервиса.
///
/// - `https://host` -> `wss://host/ws`
/// - `http://host:8080` -> `ws://host:8080/ws`
/// - `ws://` / `wss://` оставляем как есть (меняется только путь)
pub fn stream_url(origin: &str) -> Result<Url, EndpointError> {
    let mut url = Url::parse(origin.trim())?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
    };

    if url.host_str().is_none_or(str::is_empty) {
        return Err(EndpointError::MissingHost);
    }

    // http <-> ws относятся к "special" схемам, поэтому set_scheme не откажет
    url.set_scheme(scheme)
        .map_err(|_| EndpointError::UnsupportedScheme(url.scheme().to_string()))?;
    url.set_path(STREAM_PATH);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

/// `true`, если эндпоинт использует защищённый вариант протокола
pub fn is_secure(url: &Url) -> bool {
    url.scheme() == "wss"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_origin_maps_to_wss() {
        let url = stream_url("https://app.example.com").unwrap();
        assert_eq!(url.as_str(), "wss://app.example.com/ws");
        assert!(is_secure(&url));
    }

    #[test]
    fn plain_origin_keeps_port_and_drops_path_and_query() {
        let url = stream_url("http://localhost:8080/dashboard?tab=1#top").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/ws");
        assert!(!is_secure(&url));
    }

    #[test]
    fn websocket_schemes_are_accepted() {
        assert_eq!(
            stream_url("wss://feed.example.com/").unwrap().as_str(),
            "wss://feed.example.com/ws"
        );
        assert_eq!(
            stream_url(" ws://127.0.0.1:9000 ").unwrap().as_str(),
            "ws://127.0.0.1:9000/ws"
        );
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert!(matches!(
            stream_url("ftp://example.com"),
            Err(EndpointError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            stream_url("not a url"),
            Err(EndpointError::InvalidOrigin(_))
        ));
    }
}
