mod article;

pub use article::{Article, ExtractedContent, NewArticle, PublicationState};
