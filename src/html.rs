//! Minimal HTML rendering of an [`Invoice`], suitable as input for the PDF writer.

use std::fmt::Write as _;

use crate::invoice::{Invoice, InvoiceLine, Party};

/// Escapes the characters that are significant in HTML text and attribute values.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Renders the invoice as a standalone HTML document.
pub fn render_invoice(invoice: &Invoice) -> String {
    let currency = invoice.currency.as_deref().unwrap_or_default();
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\">");
    let _ = write!(html, "<title>Factura {}</title>", escape(&invoice.id));
    html.push_str("</head>\n<body>\n");

    let _ = writeln!(html, "<h1>Factura {}</h1>", escape(&invoice.id));
    let mut dates = Vec::new();
    if let Some(issued) = &invoice.issue_date {
        dates.push(format!("<b>Data emiterii:</b> {}", escape(issued)));
    }
    if let Some(due) = &invoice.due_date {
        dates.push(format!("<b>Data scadentei:</b> {}", escape(due)));
    }
    if !dates.is_empty() {
        let _ = writeln!(html, "<p>{}</p>", dates.join("<br>"));
    }

    push_party(&mut html, "Furnizor", &invoice.supplier);
    push_party(&mut html, "Client", &invoice.customer);

    if !invoice.lines.is_empty() {
        html.push_str("<table>\n<tr><th>Nr.</th><th>Denumire</th><th>Cantitate</th>");
        html.push_str("<th>Pret unitar</th><th>Valoare</th></tr>\n");
        for line in &invoice.lines {
            push_line(&mut html, line, currency);
        }
        html.push_str("</table>\n");
    }

    if let Some(tax) = &invoice.tax_amount {
        let _ = writeln!(
            html,
            "<p align=\"right\"><b>TVA:</b> {}</p>",
            amount(tax, currency)
        );
    }
    if let Some(payable) = &invoice.payable_amount {
        let _ = writeln!(
            html,
            "<p align=\"right\"><b>Total de plata:</b> {}</p>",
            amount(payable, currency)
        );
    }
    if let Some(note) = &invoice.note {
        let _ = writeln!(html, "<p><i>{}</i></p>", escape(note));
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn push_party(html: &mut String, label: &str, party: &Party) {
    let _ = write!(html, "<h2>{}</h2>\n<p>{}", label, escape(&party.display_name()));
    if let Some(tax_id) = party.tax_id() {
        let _ = write!(html, "<br>CIF: {}", escape(tax_id));
    }
    if let Some(address) = party.address() {
        let _ = write!(html, "<br>{}", escape(&address));
    }
    html.push_str("</p>\n");
}

fn push_line(html: &mut String, line: &InvoiceLine, currency: &str) {
    let quantity = match &line.unit_code {
        Some(unit) => format!("{} {}", escape(&line.quantity), escape(unit)),
        None => escape(&line.quantity),
    };
    let unit_price = line
        .unit_price
        .as_deref()
        .map(|price| amount(price, currency))
        .unwrap_or_default();
    let _ = writeln!(
        html,
        "<tr><td>{}</td><td>{}</td><td align=\"right\">{}</td><td align=\"right\">{}</td><td align=\"right\">{}</td></tr>",
        escape(&line.id),
        escape(&line.name),
        quantity,
        unit_price,
        amount(&line.line_amount, currency),
    );
}

fn amount(value: &str, currency: &str) -> String {
    if currency.is_empty() {
        escape(value)
    } else {
        format!("{} {}", escape(value), escape(currency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::html_to_blocks;
    use crate::model::Block;

    fn sample() -> Invoice {
        let mut invoice = Invoice::new("INV-001")
            .with_supplier(Party::new("Acme").with_tax_id(Some("RO123".to_owned())))
            .with_customer(Party::new("Beta & Sons"))
            .with_line(InvoiceLine {
                id: "1".into(),
                name: "Widget <large>".into(),
                quantity: "2".into(),
                unit_code: Some("H87".into()),
                unit_price: Some("5.00".into()),
                line_amount: "10.00".into(),
            });
        invoice.currency = Some("RON".into());
        invoice.payable_amount = Some("11.90".into());
        invoice
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn renders_parties_lines_and_totals() {
        let html = render_invoice(&sample());
        assert!(html.contains("<h1>Factura INV-001</h1>"));
        assert!(html.contains("Beta &amp; Sons"));
        assert!(html.contains("Widget &lt;large&gt;"));
        assert!(html.contains("CIF: RO123"));
        assert!(html.contains("11.90 RON"));
    }

    #[test]
    fn output_converts_into_layout_blocks() {
        let blocks = html_to_blocks(&render_invoice(&sample()));
        assert!(matches!(blocks.first(), Some(Block::Heading { level: 1, .. })));
        let rows = blocks
            .iter()
            .find_map(|block| match block {
                Block::Table(rows) => Some(rows),
                _ => None,
            })
            .expect("line item table");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1].plain_text(), "Widget <large>");
    }

    #[test]
    fn omits_table_without_lines() {
        let html = render_invoice(&Invoice::new("EMPTY"));
        assert!(!html.contains("<table>"));
    }
}
