use anyhow::Result;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

pub const RDF_NS: &[u8] = b"http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const MAF_NS: &[u8] = b"http://maf.mozdev.org/metadata/rdf#";

/// Metadata of one MAFF unit, read from its `index.rdf`.
///
/// Every field is the `rdf:resource` attribute of the `maf:<field>` element
/// of the same name. Only the first occurrence of each element counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RdfMetadata {
    pub index_filename: Option<String>,
    pub title: Option<String>,
    pub original_url: Option<String>,
    pub archive_time: Option<String>,
    pub charset: Option<String>,
}

impl RdfMetadata {
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut meta = RdfMetadata::default();
        let mut reader = NsReader::from_reader(xml);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let (ns, event) = reader.read_resolved_event_into(&mut buf)?;
            let in_maf = matches!(ns, ResolveResult::Bound(Namespace(n)) if n == MAF_NS);

            match event {
                Event::Start(e) | Event::Empty(e) if in_maf => {
                    let Some(slot) = meta.slot(e.local_name().as_ref()) else {
                        continue;
                    };
                    if slot.is_some() {
                        continue;
                    }
                    for attr in e.attributes() {
                        let attr = attr?;
                        let (attr_ns, local) = reader.resolve_attribute(attr.key);
                        let in_rdf =
                            matches!(attr_ns, ResolveResult::Bound(Namespace(n)) if n == RDF_NS);
                        let is_resource = in_rdf && local.as_ref() == b"resource";
                        if is_resource {
                            *slot = Some(attr.unescape_value()?.into_owned());
                            break;
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(meta)
    }

    fn slot(&mut self, element: &[u8]) -> Option<&mut Option<String>> {
        match element {
            b"indexfilename" => Some(&mut self.index_filename),
            b"title" => Some(&mut self.title),
            b"originalurl" => Some(&mut self.original_url),
            b"archivetime" => Some(&mut self.archive_time),
            b"charset" => Some(&mut self.charset),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<RDF:RDF xmlns:MAF="http://maf.mozdev.org/metadata/rdf#"
         xmlns:NC="http://home.netscape.com/NC-rdf#"
         xmlns:RDF="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <RDF:Description RDF:about="urn:root">
    <MAF:originalurl RDF:resource="http://example.com/a?b=1&amp;c=2"/>
    <MAF:title RDF:resource="Example"/>
    <MAF:archivetime RDF:resource="Mon, 01 Jan 2024 00:00:00 GMT"/>
    <MAF:indexfilename RDF:resource="page.html"/>
    <MAF:charset RDF:resource="UTF-8"/>
  </RDF:Description>
</RDF:RDF>"#;

    #[test]
    fn test_parse_full_metadata() {
        let meta = RdfMetadata::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(meta.index_filename.as_deref(), Some("page.html"));
        assert_eq!(meta.title.as_deref(), Some("Example"));
        assert_eq!(meta.original_url.as_deref(), Some("http://example.com/a?b=1&c=2"));
        assert_eq!(meta.charset.as_deref(), Some("UTF-8"));
    }

    #[test]
    fn test_namespace_prefix_does_not_matter() {
        let xml = r#"<r:RDF xmlns:r="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                            xmlns:m="http://maf.mozdev.org/metadata/rdf#">
                       <r:Description><m:indexfilename r:resource="index.xhtml"></m:indexfilename></r:Description>
                     </r:RDF>"#;
        let meta = RdfMetadata::parse(xml.as_bytes()).unwrap();
        assert_eq!(meta.index_filename.as_deref(), Some("index.xhtml"));
    }

    #[test]
    fn test_wrong_namespace_is_ignored() {
        let xml = r#"<RDF xmlns:x="urn:other"><x:indexfilename resource="a.html"/></RDF>"#;
        let meta = RdfMetadata::parse(xml.as_bytes()).unwrap();
        assert_eq!(meta.index_filename, None);
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(RdfMetadata::parse(b"<RDF:RDF><unclosed></RDF:RDF>").is_err());
    }
}
