//! Media and link rules shared by every normalizer
//!
//! Images end up in a `<figure>`, iframes are cleaned and switched to the
//! privacy-respecting variant of known video providers, callouts use one
//! class vocabulary and links are resolved against the site.

use url::Url;

use super::dom::{Element, Node};
use crate::crawler::url::resolve_url;
use crate::utils::error::ParseError;
use crate::utils::slugify;

/// `rel` value set on content links
pub const LINK_REL: &str = "noopener noreferrer";

const YOUTUBE_HOSTS: &[&str] = &["www.youtube.com", "youtube.com", "youtu.be", "www.youtu.be"];
const VIMEO_HOSTS: &[&str] = &["player.vimeo.com", "vimeo.com"];
const WISTIA_HOSTS: &[&str] = &[
    "fast.wistia.net",
    "fast.wistia.com",
    "wistia.net",
    "wistia.com",
];

const IMAGE_LOADING_ATTRS: &[&str] = &[
    "srcset",
    "sizes",
    "loading",
    "fetchpriority",
    "decoding",
    "style",
];

/// Rewrite a video URL to the provider's no-tracking variant
///
/// # Examples
///
/// ```
/// use kb_exporter::parser::media::video_no_cookie;
///
/// assert_eq!(
///     video_no_cookie("https://www.youtube.com/embed/abc"),
///     "https://www.youtube-nocookie.com/embed/abc"
/// );
/// assert_eq!(
///     video_no_cookie("https://player.vimeo.com/video/1"),
///     "https://player.vimeo.com/video/1?dnt=1"
/// );
/// ```
pub fn video_no_cookie(src: &str) -> String {
    let Ok(mut url) = Url::parse(src) else {
        return src.to_string();
    };
    let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
        return src.to_string();
    };

    if YOUTUBE_HOSTS.contains(&host.as_str()) {
        if url.set_host(Some("www.youtube-nocookie.com")).is_err() {
            return src.to_string();
        }
    } else if VIMEO_HOSTS.contains(&host.as_str()) {
        set_query_flag(&mut url, "dnt", "1");
    } else if WISTIA_HOSTS.contains(&host.as_str()) {
        set_query_flag(&mut url, "doNotTrack", "true");
    } else {
        return src.to_string();
    }
    url.to_string()
}

fn set_query_flag(url: &mut Url, key: &str, value: &str) {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut query = url.query_pairs_mut();
    query.clear();
    for (k, v) in &pairs {
        query.append_pair(k, v);
    }
    query.append_pair(key, value);
}

/// Strip sizing attributes and force the embed permissions of an iframe
#[must_use]
pub fn clean_iframe(mut iframe: Element) -> Element {
    iframe.remove_attrs(&["width", "height", "loading", "type", "style", "class"]);
    if let Some(src) = iframe.attr("src").map(video_no_cookie) {
        iframe.set_attr("src", src);
    }
    iframe.set_attr("frameborder", "0");
    iframe.set_attr("allowfullscreen", "");
    iframe.set_attr("allow", "fullscreen; picture-in-picture");
    iframe.children.clear();
    iframe
}

/// Wrap a cleaned iframe in the video embed container
#[must_use]
pub fn video_embed(iframe: Element) -> Element {
    Element::new("div")
        .with_class("iframe-wrapper video-embed")
        .with_children(vec![clean_iframe(iframe).into()])
}

/// Video embed for an iframe `src`
#[must_use]
pub fn video_embed_src(src: &str) -> Element {
    video_embed(Element::new("iframe").with_attr("src", src))
}

/// Drop responsive-loading attributes and an empty `alt`
#[must_use]
pub fn clean_image(mut img: Element) -> Element {
    img.remove_attrs(IMAGE_LOADING_ATTRS);
    if img.attr("alt").is_some_and(|alt| alt.trim().is_empty()) {
        img.remove_attr("alt");
    }
    img.children.clear();
    img
}

/// Centered figure around `content`
#[must_use]
pub fn figure(content: Vec<Node>) -> Element {
    Element::new("figure")
        .with_class("align--center width--normal")
        .with_children(content)
}

/// Image wrapped in a figure, unless its parent already is one
#[must_use]
pub fn figure_image(img: Element, parent: Option<&str>) -> Node {
    let img = clean_image(img);
    if parent == Some("figure") {
        img.into()
    } else {
        figure(vec![img.into()]).into()
    }
}

/// Whether a wrapper holds nothing but images (and whitespace)
#[must_use]
pub fn holds_only_images(el: &Element) -> bool {
    let mut images = 0;
    for child in &el.children {
        match child {
            Node::Text(t) if t.trim().is_empty() => {}
            Node::Element(e) if e.name == "img" => images += 1,
            Node::Element(e) if e.name == "br" => {}
            _ => return false,
        }
    }
    images > 0
}

/// Callout variants of the output dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callout {
    Info,
    Warning,
    Danger,
    Success,
}

impl Callout {
    #[must_use]
    pub fn class(self) -> &'static str {
        match self {
            Self::Info => "callout--info",
            Self::Warning => "callout--warning",
            Self::Danger => "callout--danger",
            Self::Success => "callout--success",
        }
    }

    /// Callout container around `children`
    #[must_use]
    pub fn wrap(self, children: Vec<Node>, icon: bool) -> Element {
        let mut classes = vec!["callout", self.class()];
        if icon {
            classes.push("callout--icon");
        }
        let mut el = Element::new("div").with_children(children);
        el.set_classes(&classes);
        el
    }
}

/// Resolve the `href` of a content link and set `rel` (and `target`)
///
/// # Errors
///
/// Returns `ParseError::UnexpectedShape` when the href cannot be resolved.
pub fn clean_link(
    mut a: Element,
    base_url: &str,
    page_url: &str,
    new_tab: bool,
) -> Result<Element, ParseError> {
    if let Some(href) = a.attr("href") {
        if !href.starts_with('#') {
            let resolved = resolve_url(base_url, href)
                .map_err(|e| ParseError::shape(page_url, format!("link {}: {e}", a.describe())))?;
            a.set_attr("href", resolved);
        }
    }
    if new_tab {
        a.set_attr("target", "_blank");
    }
    a.set_attr("rel", LINK_REL);
    Ok(a)
}

/// Anchor id of a heading, derived from its text
#[must_use]
pub fn heading_id(heading: &Element) -> String {
    slugify(&heading.text())
}

/// Heading one level lower, capped at `h6`
#[must_use]
pub fn demote_heading(name: &str) -> String {
    match name.strip_prefix('h').and_then(|n| n.parse::<u8>().ok()) {
        Some(level) if (1..=6).contains(&level) => format!("h{}", (level + 1).min(6)),
        _ => name.to_string(),
    }
}

#[must_use]
pub fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_variants() {
        assert_eq!(
            video_no_cookie("https://www.youtube.com/embed/abc"),
            "https://www.youtube-nocookie.com/embed/abc"
        );
        assert_eq!(
            video_no_cookie("https://youtube.com/embed/abc?start=4"),
            "https://www.youtube-nocookie.com/embed/abc?start=4"
        );
    }

    #[test]
    fn test_vimeo_and_wistia_flags() {
        assert_eq!(
            video_no_cookie("https://player.vimeo.com/video/42?autoplay=0"),
            "https://player.vimeo.com/video/42?autoplay=0&dnt=1"
        );
        assert_eq!(
            video_no_cookie("https://fast.wistia.net/embed/iframe/x1"),
            "https://fast.wistia.net/embed/iframe/x1?doNotTrack=true"
        );
    }

    #[test]
    fn test_unknown_provider_unchanged() {
        for src in ["https://www.loom.com/embed/abc", "not a url", "/relative/embed"] {
            assert_eq!(video_no_cookie(src), src);
        }
    }

    #[test]
    fn test_video_embed() {
        let iframe = Element::new("iframe")
            .with_attr("src", "https://www.youtube.com/embed/abc")
            .with_attr("width", "560")
            .with_attr("height", "315");
        let html = video_embed(iframe).to_html();
        assert_eq!(
            html,
            "<div class=\"iframe-wrapper video-embed\"><iframe \
             src=\"https://www.youtube-nocookie.com/embed/abc\" frameborder=\"0\" \
             allowfullscreen=\"\" allow=\"fullscreen; picture-in-picture\"></iframe></div>"
        );
    }

    #[test]
    fn test_image_is_wrapped_and_cleaned() {
        let img = Element::new("img")
            .with_attr("src", "a.png")
            .with_attr("alt", "")
            .with_attr("srcset", "a.png 1x")
            .with_attr("loading", "lazy");
        let node = figure_image(img, Some("p"));
        assert_eq!(
            node.as_element().unwrap().to_html(),
            "<figure class=\"align--center width--normal\"><img src=\"a.png\"></figure>"
        );
    }

    #[test]
    fn test_image_in_figure_not_rewrapped() {
        let img = Element::new("img").with_attr("src", "a.png").with_attr("alt", "A");
        let node = figure_image(img, Some("figure"));
        assert!(node.is_element("img"));
    }

    #[test]
    fn test_holds_only_images() {
        let p = Element::new("p").with_children(vec![
            Node::text(" "),
            Element::new("img").into(),
            Element::new("br").into(),
        ]);
        assert!(holds_only_images(&p));
        assert!(!holds_only_images(&Element::new("p").with_text("caption")));
        assert!(!holds_only_images(&Element::new("p")));
    }

    #[test]
    fn test_callout_classes() {
        let el = Callout::Warning.wrap(vec![Node::text("x")], true);
        assert_eq!(el.attr("class"), Some("callout callout--warning callout--icon"));
    }

    #[test]
    fn test_clean_link() {
        let a = Element::new("a").with_attr("href", "/contact");
        let a = clean_link(a, "https://help.example.com/en/", "https://help.example.com/en/a", true)
            .unwrap();
        assert_eq!(a.attr("href"), Some("https://help.example.com/contact"));
        assert_eq!(a.attr("target"), Some("_blank"));
        assert_eq!(a.attr("rel"), Some(LINK_REL));

        let anchor = clean_link(Element::new("a").with_attr("href", "#top"), "https://x.io/", "u", false)
            .unwrap();
        assert_eq!(anchor.attr("href"), Some("#top"));
        assert!(!anchor.has_attr("target"));
    }

    #[test]
    fn test_demote_heading() {
        assert_eq!(demote_heading("h1"), "h2");
        assert_eq!(demote_heading("h6"), "h6");
        assert_eq!(demote_heading("p"), "p");
    }
}
