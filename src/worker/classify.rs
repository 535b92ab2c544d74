//! Request classification: which caching strategy a request gets.

use crate::net::Request;

/// The strategy classes for intercepted requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
  /// HTML navigation to a page with no useful cached substitute.
  GenericPage,
  /// HTML navigation to a single party page, cached opportunistically.
  PartyPage,
  /// Everything that does not want an HTML document.
  StaticAsset,
}

/// Classify a request by its `Accept` header and URL shape.
pub fn classify(request: &Request) -> RequestClass {
  let wants_html = request
    .accept
    .as_deref()
    .map(|accept| accept.contains("text/html"))
    .unwrap_or(false);

  if !wants_html {
    return RequestClass::StaticAsset;
  }

  if is_party_path(request.url.path()) {
    RequestClass::PartyPage
  } else {
    RequestClass::GenericPage
  }
}

/// True for paths ending in a `party/` segment followed by one alphanumeric
/// segment, e.g. `/party/abc123`.
fn is_party_path(path: &str) -> bool {
  let mut segments = path.rsplit('/');
  match (segments.next(), segments.next()) {
    (Some(id), Some(parent)) => {
      parent == "party" && !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
    }
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  fn request(path: &str, accept: Option<&str>) -> Request {
    let url = Url::parse("https://party.example").unwrap().join(path).unwrap();
    let mut request = Request::get(url);
    request.accept = accept.map(String::from);
    request
  }

  #[test]
  fn test_party_page() {
    let req = request("/party/abc123", Some("text/html"));
    assert_eq!(classify(&req), RequestClass::PartyPage);
  }

  #[test]
  fn test_party_page_nested_prefix() {
    let req = request("/app/party/9", Some("text/html"));
    assert_eq!(classify(&req), RequestClass::PartyPage);
  }

  #[test]
  fn test_party_page_browser_accept_list() {
    // Browsers send a list; text/html anywhere in it counts.
    let req = request(
      "/party/xyz",
      Some("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    assert_eq!(classify(&req), RequestClass::PartyPage);
  }

  #[test]
  fn test_party_without_id_is_generic() {
    let req = request("/party/", Some("text/html"));
    assert_eq!(classify(&req), RequestClass::GenericPage);
  }

  #[test]
  fn test_party_id_must_be_alphanumeric() {
    let req = request("/party/abc-123", Some("text/html"));
    assert_eq!(classify(&req), RequestClass::GenericPage);
  }

  #[test]
  fn test_party_must_be_last_segments() {
    let req = request("/party/abc123/guests", Some("text/html"));
    assert_eq!(classify(&req), RequestClass::GenericPage);
  }

  #[test]
  fn test_generic_page() {
    let req = request("/", Some("text/html"));
    assert_eq!(classify(&req), RequestClass::GenericPage);
  }

  #[test]
  fn test_non_html_is_static() {
    let req = request("/main.css", Some("text/css,*/*;q=0.1"));
    assert_eq!(classify(&req), RequestClass::StaticAsset);
  }

  #[test]
  fn test_missing_accept_is_static() {
    let req = request("/party/abc123", None);
    assert_eq!(classify(&req), RequestClass::StaticAsset);
  }
}
