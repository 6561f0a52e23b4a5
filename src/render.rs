use anyhow::Result;

use crate::models::{Category, Customer, Inspection, InspectionLine, Machine};

/// Everything the certificate layout needs, loaded by the caller so the
/// renderer stays free of database access.
pub struct CertificateContext<'a> {
    pub inspection: &'a Inspection,
    pub machine: &'a Machine,
    pub customer: &'a Customer,
    pub category: &'a Category,
    pub lines: &'a [InspectionLine],
    pub public_url: Option<String>,
}

pub struct RenderedCertificate {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub extension: &'static str,
}

/// Seam for the delegated layout engine. Rendering is best-effort: a failing
/// renderer is logged by the caller and never blocks the pass transition.
pub trait CertificateRenderer: Send + Sync + 'static {
    fn render(&self, context: &CertificateContext<'_>) -> Result<RenderedCertificate>;
}

/// Self-contained HTML certificate. Stands in for the external PDF layout
/// service in deployments that do not run one.
pub struct HtmlCertificateRenderer;

impl CertificateRenderer for HtmlCertificateRenderer {
    fn render(&self, context: &CertificateContext<'_>) -> Result<RenderedCertificate> {
        let inspection = context.inspection;
        let mut rows = String::new();
        for line in context.lines {
            rows.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(line.section.as_deref().unwrap_or("")),
                escape(line.serial_no.as_deref().unwrap_or("")),
                escape(&line.name),
                line.disposition().as_str(),
            ));
        }

        let link = context
            .public_url
            .as_deref()
            .map(|url| format!("<p><a href=\"{}\">{}</a></p>", escape(url), escape(url)))
            .unwrap_or_default();

        let html = format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Certificate {reference}</title></head>\n<body>\n\
             <h1>Certificate of Inspection</h1>\n\
             <p>Reference: {reference}</p>\n\
             <p>Customer: {customer}</p>\n\
             <p>Machine: {machine} (S/N {serial})</p>\n\
             <p>Category: {category}</p>\n\
             <p>Date of inspection: {start}</p>\n\
             <p>Next due date: {expire}</p>\n\
             <p>Inspector: {inspector}</p>\n\
             {link}\
             <table border=\"1\">\n<tr><th>Section</th><th>No</th><th>Examination item</th><th>Result</th></tr>\n{rows}</table>\n\
             </body>\n</html>\n",
            reference = escape(&inspection.reference),
            customer = escape(&context.customer.name),
            machine = escape(&context.machine.name),
            serial = escape(context.machine.serial_number.as_deref().unwrap_or("-")),
            category = escape(&context.category.name),
            start = inspection.start_date,
            expire = inspection
                .expire_date
                .map(|date| date.to_string())
                .unwrap_or_else(|| "-".to_string()),
            inspector = escape(inspection.inspector_name.as_deref().unwrap_or("-")),
        );

        Ok(RenderedCertificate {
            bytes: html.into_bytes(),
            content_type: "text/html; charset=utf-8",
            extension: "html",
        })
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::escape;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
        assert_eq!(escape("plain"), "plain");
    }
}
