//! Bootstrap page handing an in-memory archive to the single-page viewer.
//!
//! In-memory targets cannot be plain file URLs, so each one becomes a small
//! `data:text/html` document. It loads the viewer script and embeds the
//! archive as a data URL together with the index file to open.

use base64::Engine as _;
use serde::Serialize;

/// Payload read by the viewer script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerData<'a> {
    pub virtual_base: &'a str,
    pub index_file: &'a str,
    /// `data:` URL of the archive, carrying a `filename=` parameter.
    pub zip: &'a str,
}

/// Where the viewer's resources live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bootstrap {
    pub virtual_base: String,
    pub viewer_script: String,
    pub title: String,
}

impl Bootstrap {
    pub fn render(&self, data: &ViewerData<'_>) -> serde_json::Result<String> {
        // `</` would end the script element early.
        let json = serde_json::to_string(data)?.replace("</", "<\\/");
        Ok(format!(
            concat!(
                "<!DOCTYPE html>\n",
                "<html>\n",
                "<head>\n",
                "<meta charset=\"UTF-8\">\n",
                "<title>{title}</title>\n",
                "<script src=\"{script}\">{json}</script>\n",
                "<style>\n",
                "body {{ margin: 0; border: 0; padding: 0; }}\n",
                "#wrapper {{ position: relative; height: 100vh; }}\n",
                "</style>\n",
                "</head>\n",
                "<body>\n",
                "<div id=\"wrapper\"></div>\n",
                "</body>\n",
                "</html>\n",
            ),
            title = escape_html(&self.title),
            script = escape_html(&self.viewer_script),
            json = json,
        ))
    }

    /// `data:text/html` URL of the page opening `index_file` from `zip`.
    pub fn page_url(&self, index_file: &str, zip: &str) -> serde_json::Result<String> {
        let page = self.render(&ViewerData {
            virtual_base: &self.virtual_base,
            index_file,
            zip,
        })?;
        Ok(format!(
            "data:text/html;charset=utf-8;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(page)
        ))
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bootstrap() -> Bootstrap {
        Bootstrap {
            virtual_base: "viewer/!/".into(),
            viewer_script: "viewer/zipviewer.js".into(),
            title: "Web Archive <Viewer>".into(),
        }
    }

    #[test]
    fn test_render_embeds_viewer_data() {
        let page = bootstrap()
            .render(&ViewerData {
                virtual_base: "viewer/!/",
                index_file: "index.html",
                zip: "data:application/zip;filename=a.maff;base64,UEs=",
            })
            .unwrap();
        assert!(page.contains(
            r#"<script src="viewer/zipviewer.js">{"virtualBase":"viewer/!/","indexFile":"index.html","zip":"data:application/zip;filename=a.maff;base64,UEs="}</script>"#
        ));
        assert!(page.contains("<title>Web Archive &lt;Viewer&gt;</title>"));
    }

    #[test]
    fn test_script_end_tag_is_escaped() {
        let page = bootstrap()
            .render(&ViewerData {
                virtual_base: "viewer/!/",
                index_file: "</script>.html",
                zip: "data:,",
            })
            .unwrap();
        assert_eq!(page.matches("</script>").count(), 1);
    }

    #[test]
    fn test_page_url_is_base64_html() {
        let url = bootstrap().page_url("index.html", "data:,").unwrap();
        let encoded = url.strip_prefix("data:text/html;charset=utf-8;base64,").unwrap();
        let page = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
        assert!(String::from_utf8(page).unwrap().contains(r#""indexFile":"index.html""#));
    }
}
