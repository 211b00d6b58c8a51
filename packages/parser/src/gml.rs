//! GML / namespaced XML responses.
//!
//! Handles WFS `FeatureCollection`s (`wfs:member`, `gml:featureMember`),
//! `MapServer` `msGMLOutput` (`<x_layer><x_feature>`), Esri
//! `<FIELDS attr="..."/>` responses and, as a last resort, the whole
//! document as a single feature. Leaf elements are matched tolerating an
//! optional namespace prefix and attributes on the opening tag.

use std::sync::LazyLock;

use regex::Regex;

use crate::{ParseError, RawFeature};

/// `<leaf ...>text</leaf>` with optional prefixes. The opening and closing
/// names are compared in code.
static LEAF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<((?:[\w.-]+:)?([\w.-]+))(?:\s[^<>]*)?>([^<]*)</((?:[\w.-]+:)?[\w.-]+)\s*>")
        .expect("valid regex")
});

static MEMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?s)<(?:[\w.-]+:)?(?:featureMember|member)\b[^>]*>(.*?)",
        r"</(?:[\w.-]+:)?(?:featureMember|member)\s*>",
    ))
    .expect("valid regex")
});

static MS_LAYER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<([\w.-]+)_layer\b[^>]*>(.*?)</[\w.-]+_layer\s*>").expect("valid regex")
});

static MS_FEATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<([\w.-]+)_feature\b[^>]*>(.*?)</[\w.-]+_feature\s*>").expect("valid regex")
});

static ESRI_FIELDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<FIELDS\b([^>]*?)/?>").expect("valid regex"));

static ATTRIBUTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([\w.:-]+)\s*=\s*"([^"]*)""#).expect("valid regex"));

/// WFS 1.1 plural container holding sibling features of one type.
static FEATURE_MEMBERS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:[\w.-]+:)?featureMembers\b[^>]*>(.*?)</(?:[\w.-]+:)?featureMembers\s*>")
        .expect("valid regex")
});

/// First element inside a block: qualified name and local name.
static FIRST_ELEMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<((?:[\w.-]+:)?([\w.-]+))").expect("valid regex"));

/// Splits an XML body into raw features.
///
/// # Errors
///
/// Returns [`ParseError::Malformed`] if the body is not markup at all.
pub fn features(text: &str) -> Result<Vec<RawFeature>, ParseError> {
    if !text.starts_with('<') {
        return Err(ParseError::Malformed {
            message: format!(
                "expected XML, got {:?}",
                text.chars().take(40).collect::<String>()
            ),
        });
    }
    let text = strip_cdata(text);

    let mut members: Vec<RawFeature> = MEMBER_RE
        .captures_iter(&text)
        .filter_map(|caps| {
            let block = caps.get(1)?.as_str();
            leaf_feature(block, first_element(block).map(|(_, local)| local))
        })
        .collect();
    for caps in FEATURE_MEMBERS_RE.captures_iter(&text) {
        let Some(block) = caps.get(1) else {
            continue;
        };
        members.extend(split_siblings(block.as_str()).into_iter().filter_map(|sibling| {
            leaf_feature(sibling, first_element(sibling).map(|(_, local)| local))
        }));
    }
    if !members.is_empty() {
        return Ok(members);
    }

    let mut ms_features = Vec::new();
    for layer_caps in MS_LAYER_RE.captures_iter(&text) {
        let layer = layer_caps.get(1).map(|m| m.as_str());
        let body = layer_caps.get(2).map_or("", |m| m.as_str());
        ms_features.extend(
            MS_FEATURE_RE
                .captures_iter(body)
                .filter_map(|caps| leaf_feature(caps.get(2)?.as_str(), layer)),
        );
    }
    if ms_features.is_empty() {
        ms_features.extend(MS_FEATURE_RE.captures_iter(&text).filter_map(|caps| {
            let layer = caps.get(1).map(|m| m.as_str());
            leaf_feature(caps.get(2)?.as_str(), layer)
        }));
    }
    if !ms_features.is_empty() {
        return Ok(ms_features);
    }

    let esri: Vec<RawFeature> = ESRI_FIELDS_RE
        .captures_iter(&text)
        .filter_map(|caps| {
            let mut feature = RawFeature::new(None);
            for attr in ATTRIBUTE_RE.captures_iter(caps.get(1)?.as_str()) {
                feature.insert_text(&attr[1], &decode_entities(&attr[2]));
            }
            (!feature.is_empty()).then_some(feature)
        })
        .collect();
    if !esri.is_empty() {
        return Ok(esri);
    }

    Ok(leaf_feature(&text, None).into_iter().collect())
}

/// Qualified and local name of the first element in `block`.
fn first_element(block: &str) -> Option<(&str, &str)> {
    let caps = FIRST_ELEMENT_RE.captures(block)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Splits a container body into its sibling elements, assuming every
/// sibling has the same qualified name as the first one.
fn split_siblings(block: &str) -> Vec<&str> {
    let Some((qualified, _)) = first_element(block) else {
        return Vec::new();
    };
    let open = format!("<{qualified}");
    let close = format!("</{qualified}>");

    let mut siblings = Vec::new();
    let mut rest = block;
    while let Some(start) = rest.find(&open) {
        let tail = &rest[start..];
        let Some(end) = tail.find(&close) else {
            break;
        };
        let end = end + close.len();
        siblings.push(&tail[..end]);
        rest = &tail[end..];
    }
    siblings
}

/// Collects all leaf elements of `block` into one feature.
fn leaf_feature(block: &str, layer: Option<&str>) -> Option<RawFeature> {
    let mut feature = RawFeature::new(layer);
    for (name, value) in leaves(block) {
        feature.insert_text(name, &value);
    }
    (!feature.is_empty()).then_some(feature)
}

/// Iterates `(local name, decoded text)` for every well-formed leaf.
fn leaves(xml: &str) -> impl Iterator<Item = (&str, String)> {
    LEAF_RE.captures_iter(xml).filter_map(|caps| {
        let open = caps.get(1)?.as_str();
        let close = caps.get(4)?.as_str();
        if open != close {
            return None;
        }
        let local = caps.get(2)?.as_str();
        let value = decode_entities(caps.get(3)?.as_str().trim());
        Some((local, value))
    })
}

/// Returns the text of every leaf element whose local name equals `name`
/// (case-insensitive), in document order.
///
/// Used by capability discovery to pull `<Name>` values out of
/// `GetCapabilities` documents.
#[must_use]
pub fn tag_values(xml: &str, name: &str) -> Vec<String> {
    leaves(xml)
        .filter(|(local, value)| local.eq_ignore_ascii_case(name) && !value.is_empty())
        .map(|(_, value)| value)
        .collect()
}

fn strip_cdata(text: &str) -> String {
    text.replace("<![CDATA[", "").replace("]]>", "")
}

/// Decodes the predefined XML entities and numeric character references.
#[must_use]
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';').filter(|&e| e <= 10) else {
            out.push('&');
            rest = &tail[1..];
            continue;
        };
        let entity = &tail[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        if let Some(c) = decoded {
            out.push(c);
            rest = &tail[end + 1..];
        } else {
            out.push('&');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use crate::FieldValue;

    use super::*;

    fn text_of<'a>(feature: &'a RawFeature, key: &str) -> Option<&'a str> {
        match feature.get(key)? {
            FieldValue::Text(s) => Some(s.as_str()),
            FieldValue::Number(_) => None,
        }
    }

    #[test]
    fn wfs2_members_with_prefixes_and_attributes() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs/2.0" numberMatched="2">
  <wfs:member>
    <boris:brw_zonen gml:id="brw.1">
      <boris:brw uom="EUR/m2">650</boris:brw>
      <boris:nutzungsart>W</boris:nutzungsart>
      <boris:geom><gml:Polygon><gml:posList>1 2 3 4</gml:posList></gml:Polygon></boris:geom>
    </boris:brw_zonen>
  </wfs:member>
  <wfs:member>
    <boris:brw_zonen gml:id="brw.2">
      <boris:brw>3,10</boris:brw>
      <boris:nutzungsart>LW</boris:nutzungsart>
    </boris:brw_zonen>
  </wfs:member>
</wfs:FeatureCollection>"#;
        let features = features(body).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].layer.as_deref(), Some("brw_zonen"));
        assert_eq!(text_of(&features[0], "brw"), Some("650"));
        assert_eq!(text_of(&features[1], "nutzungsart"), Some("LW"));
    }

    #[test]
    fn wfs11_feature_members_are_not_merged() {
        let body = r"<wfs:FeatureCollection><gml:featureMembers>
  <app:brw gml:id='a'><app:wert>100</app:wert></app:brw>
  <app:brw gml:id='b'><app:wert>200</app:wert></app:brw>
</gml:featureMembers></wfs:FeatureCollection>";
        let features = features(body).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(text_of(&features[1], "wert"), Some("200"));
        assert_eq!(features[0].layer.as_deref(), Some("brw"));
    }

    #[test]
    fn mapserver_gml_output_uses_layer_names() {
        let body = r"<msGMLOutput>
  <brw_bauland_layer>
    <gml:name>brw_bauland</gml:name>
    <brw_bauland_feature>
      <BRW>420</BRW>
      <STAG>01.01.2024</STAG>
    </brw_bauland_feature>
  </brw_bauland_layer>
  <brw_forst_layer>
    <brw_forst_feature><BRW>1,10</BRW></brw_forst_feature>
  </brw_forst_layer>
</msGMLOutput>";
        let features = features(body).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].layer.as_deref(), Some("brw_bauland"));
        assert_eq!(features[1].layer.as_deref(), Some("brw_forst"));
    }

    #[test]
    fn esri_fields_attributes() {
        let body = r#"<FeatureInfoResponse>
            <FIELDS BRW="235" STAG="2024-01-01" NUTA="M &amp; W"/>
        </FeatureInfoResponse>"#;
        let features = features(body).unwrap();
        assert_eq!(text_of(&features[0], "nuta"), Some("M & W"));
    }

    #[test]
    fn whole_document_fallback_and_mismatched_tags() {
        let body = "<Result><BRW>99</BRW><broken>1</other></Result>";
        let features = features(body).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(text_of(&features[0], "brw"), Some("99"));
        assert!(features[0].get("broken").is_none());
    }

    #[test]
    fn truncated_xml_yields_no_features() {
        let body = "<wfs:FeatureCollection><wfs:member><b:x><b:BRW>12";
        assert!(features(body).unwrap().is_empty());
    }

    #[test]
    fn non_xml_is_malformed() {
        assert!(matches!(features("BRW = 1"), Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn tag_values_finds_names_in_capabilities() {
        let caps = r#"<WMS_Capabilities><Capability><Layer><Name>root</Name>
            <Layer queryable="1"><wms:Name>brw_2024</wms:Name></Layer></Layer>
        </Capability></WMS_Capabilities>"#;
        assert_eq!(tag_values(caps, "name"), vec!["root", "brw_2024"]);
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(decode_entities("a &lt; b &amp;&amp; c"), "a < b && c");
        assert_eq!(decode_entities("Gr&#252;nland &#xE4;"), "Grünland ä");
        assert_eq!(decode_entities("AT&T"), "AT&T");
    }
}
