//!
//! OpenRosa formList rendering
//! ---------------------------
//! Serializes the currently listable forms into the fixed `xforms` discovery
//! document mobile clients poll. Clients are particular about this document:
//! the template below, indentation included, is reproduced byte for byte, and
//! an empty list renders the root element with no children rather than a
//! self-closed tag.

use crate::form::FormDefinition;

const XFORMS_NS: &str = "http://openrosa.org/xforms/xformsList";

/// Render the formList document for the given forms, in input order.
/// `base_url` is the externally visible origin used to build download links.
pub fn render_form_list(forms: &[FormDefinition], base_url: &str) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!("  <xforms xmlns=\"{}\">\n", XFORMS_NS));
    for form in forms {
        out.push_str("    <xform>\n");
        out.push_str(&format!("      <formID>{}</formID>\n", escape(&form.xml_form_id)));
        out.push_str(&format!("      <name>{}</name>\n", escape(&form.name)));
        out.push_str(&format!("      <version>{}</version>\n", escape(&form.version)));
        out.push_str(&format!("      <hash>md5:{}</hash>\n", form.hash));
        out.push_str(&format!(
            "      <downloadUrl>{}/v1/forms/{}.xml</downloadUrl>\n",
            base_url,
            escape(&form.xml_form_id)
        ));
        out.push_str("    </xform>\n");
    }
    out.push_str("  </xforms>");
    out
}

/// Minimal element-text escaping.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
