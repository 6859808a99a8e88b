use std::fmt;
use url::Url;

/// Card type tag the feed uses for an actual post.
pub const POST_CARD_TYPE: i64 = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub created_at: String,
    pub text: String,
    pub source: String,
    pub author_name: String,
    pub image_urls: Vec<Url>,
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) via {}: {}",
            self.id, self.author_name, self.created_at, self.source, self.text
        )?;
        if !self.image_urls.is_empty() {
            write!(f, " [{} image(s)]", self.image_urls.len())?;
        }
        Ok(())
    }
}
