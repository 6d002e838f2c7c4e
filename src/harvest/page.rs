use anyhow::{Result, Context};
use regex::Regex;

/// Cloudflare block page
pub const ACCESS_DENIED_MARKER: &str = r#"<h2 class="cf-subheadline">Access denied</h2>"#;

/// Cloudflare challenge page
pub const CAPTCHA_MARKER: &str =
    r#"<span data-translate="complete_sec_check">Please complete the security check to access</span>"#;

const OG_IMAGE_PATTERN: &str = r#"<meta property="og:image" content="(.*?)"/>"#;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Lower-case base-36 rendering of an index, `0` for zero
pub fn encode_base36(mut value: u64) -> String {
    let mut digits = Vec::with_capacity(13);

    loop {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
        if value == 0 {
            break;
        }
    }

    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Address of the page showing the screenshot with the given index
pub fn page_url(base: &str, index: u64) -> String {
    format!("{}{}", base, encode_base36(index))
}

/// Local file name for an image: index, a dot, then the remote file name
///
/// The index prefix keeps distinct screenshots sharing a remote name apart.
pub fn image_file_name(index: u64, image_url: &str) -> String {
    let remote_name = image_url.rsplit('/').next().unwrap_or(image_url);
    format!("{}.{}", index, remote_name)
}

/// What a fetched page tells us
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageVerdict {
    AccessDenied,
    Captcha,
    NoImage,
    Image(String),
}

/// Classifies page bodies
#[derive(Debug, Clone)]
pub struct PageInspector {
    og_image: Regex,
}

impl PageInspector {
    pub fn new() -> Result<Self> {
        let og_image = Regex::new(OG_IMAGE_PATTERN)
            .context("Failed to compile og:image pattern")?;

        Ok(Self { og_image })
    }

    /// Block markers win over the image tag, access denied before captcha
    pub fn inspect(&self, body: &str) -> PageVerdict {
        if body.contains(ACCESS_DENIED_MARKER) {
            return PageVerdict::AccessDenied;
        }

        if body.contains(CAPTCHA_MARKER) {
            return PageVerdict::Captcha;
        }

        match self.og_image.captures(body).and_then(|captures| captures.get(1)) {
            Some(image_url) => PageVerdict::Image(image_url.as_str().to_string()),
            None => PageVerdict::NoImage,
        }
    }
}
