use unicode_segmentation::UnicodeSegmentation;

pub const MAX_MESSAGE_GRAPHEMES: usize = 4000;

/// Validated payload of a chat message: the text itself, an image URL, a gift
/// name or a shared contact handle.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageBody(String);

impl MessageBody {
    pub fn parse(s: String) -> Result<MessageBody, String> {
        match s {
            _ if s.trim().is_empty() => {
                Err("Message is empty or contains whitespace only".to_string())
            }
            _ if s.graphemes(true).count() > MAX_MESSAGE_GRAPHEMES => Err(format!(
                "Message is longer than {MAX_MESSAGE_GRAPHEMES} graphemes"
            )),
            _ => Ok(Self(s)),
        }
    }

    pub fn parse_image_url(s: String) -> Result<MessageBody, String> {
        let body = Self::parse(s)?;
        let url = body.0.trim();
        if url.starts_with("https://") || url.starts_with("http://") {
            Ok(Self(url.to_string()))
        } else {
            Err(format!("`{url}` is not an http(s) image url"))
        }
    }
}

impl AsRef<str> for MessageBody {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
