use url::{ParseError, Url};

use crate::database::quiz::Quiz;

const X_INTENT: &str = "https://twitter.com/intent/tweet";
const FACEBOOK_SHARER: &str = "https://www.facebook.com/sharer/sharer.php";
const TELEGRAM_SHARE: &str = "https://t.me/share/url";
const WHATSAPP_SEND: &str = "https://wa.me/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLinks {
    pub page: Url,
    pub text: String,
    pub x: Url,
    pub facebook: Url,
    pub telegram: Url,
    pub whatsapp: Url,
}

impl ShareLinks {
    /// One line to paste anywhere: the brag followed by the quiz link.
    pub fn plain(&self) -> String {
        format!("{} {}", self.text, self.page)
    }
}

/// Formats outbound share links for a result. Makes no requests.
#[derive(Debug, Clone)]
pub struct ShareLinkBuilder {
    base: Url,
}

impl ShareLinkBuilder {
    /// `base` is where quiz pages live, e.g. `https://quiz.example/q/`.
    pub fn new(mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { base }
    }

    pub fn build(&self, quiz: &Quiz, result_title: &str) -> Result<ShareLinks, ParseError> {
        let page = self.base.join(quiz.slug())?;
        let text = format!("I got \"{}\" on \"{}\"!", result_title, quiz.title());

        let mut x = Url::parse(X_INTENT)?;
        x.query_pairs_mut()
            .append_pair("text", &text)
            .append_pair("url", page.as_str());

        let mut facebook = Url::parse(FACEBOOK_SHARER)?;
        facebook.query_pairs_mut().append_pair("u", page.as_str());

        let mut telegram = Url::parse(TELEGRAM_SHARE)?;
        telegram
            .query_pairs_mut()
            .append_pair("url", page.as_str())
            .append_pair("text", &text);

        let mut whatsapp = Url::parse(WHATSAPP_SEND)?;
        whatsapp
            .query_pairs_mut()
            .append_pair("text", &format!("{text} {page}"));

        Ok(ShareLinks {
            page,
            text,
            x,
            facebook,
            telegram,
            whatsapp,
        })
    }
}
