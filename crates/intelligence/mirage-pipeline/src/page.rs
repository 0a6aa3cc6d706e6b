//! Final page assembly

use askama::Template;

/// Output of a successful chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPage {
    pub title: String,
    /// Inner HTML of `<body>`
    pub body: String,
    pub css: String,
    pub script: String,
    /// Model-chosen tag the identifier is derived from
    pub shortcode: String,
}

#[derive(Template)]
#[template(path = "result.html")]
struct ResultTemplate<'a> {
    title: &'a str,
    body: &'a str,
    css: &'a str,
    script: &'a str,
}

impl GeneratedPage {
    /// Render the standalone HTML document. The title is escaped; body, css
    /// and script are inserted as generated.
    pub fn render(&self) -> Result<String, askama::Error> {
        ResultTemplate {
            title: &self.title,
            body: &self.body,
            css: &self.css,
            script: &self.script,
        }
        .render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_places_parts() {
        let page = GeneratedPage {
            title: "Cats & Dogs".to_string(),
            body: "<h1>Cats</h1>".to_string(),
            css: "h1 > span { color: red; }".to_string(),
            script: "if (1 < 2) { console.log('ok'); }".to_string(),
            shortcode: "cats".to_string(),
        };

        let html = page.render().unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Cats &amp; Dogs</title>"));
        assert!(html.contains("<style>h1 > span { color: red; }</style>"));
        assert!(html.contains("<h1>Cats</h1>"));
        assert!(html.contains("<script>if (1 < 2) { console.log('ok'); }</script>"));

        let head_end = html.find("</head>").unwrap();
        assert!(html.find("<style>").unwrap() < head_end);
        assert!(html.find("<script>").unwrap() > html.find("<h1>").unwrap());
    }
}
