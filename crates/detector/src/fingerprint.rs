use bannerscope_core::{AuditError, PageSession};
use sha2::{Digest, Sha256};

/// Hex SHA-256 of screenshot bytes.
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub bytes: Vec<u8>,
    pub digest: String,
}

/// Screenshots the element's box and hashes it. The element must be attached
/// and on screen.
pub async fn capture<P: PageSession>(page: &P, element: &P::Element) -> Result<Capture, AuditError> {
    if !page.intersects_viewport(element).await? {
        return Err(AuditError::screenshot_error("element is not in the viewport"));
    }
    let bytes = page.screenshot_element(element).await?;
    if bytes.is_empty() {
        return Err(AuditError::screenshot_error("element screenshot is empty"));
    }
    let digest = digest(&bytes);
    Ok(Capture { bytes, digest })
}

pub async fn fingerprint<P: PageSession>(page: &P, element: &P::Element) -> Result<String, AuditError> {
    Ok(capture(page, element).await?.digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_fixed_length_hex() {
        let empty = digest(b"");
        assert_eq!(empty, "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
        assert_eq!(digest(b"banner v1").len(), 64);
        assert_ne!(digest(b"banner v1"), digest(b"banner v2"));
        assert_eq!(digest(b"banner v1"), digest(b"banner v1"));
    }
}
