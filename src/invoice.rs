//! Minimal owned view of a UBL invoice.
//!
//! Only the fields needed to name the output, derive document metadata, and render the
//! invoice template are extracted. Elements are matched by local name so documents using
//! any namespace prefix for `cbc`/`cac` are accepted.

use roxmltree::Node;
use thiserror::Error;

/// Errors produced while extracting an [`Invoice`] from UBL XML.
#[derive(Debug, Error)]
pub enum InvoiceError {
    /// The input is not well-formed XML.
    #[error("failed to parse UBL XML")]
    Xml(#[from] roxmltree::Error),
    /// The document root is neither `Invoice` nor `CreditNote`.
    #[error("unexpected UBL root element `{0}`, expected `Invoice` or `CreditNote`")]
    UnexpectedRoot(String),
    /// A mandatory element is missing from the document.
    #[error("UBL document is missing required element `{0}`")]
    MissingElement(&'static str),
}

/// A trading party (supplier or customer) as found in the UBL document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Party {
    registration_name: Option<String>,
    party_name: Option<String>,
    tax_id: Option<String>,
    street: Option<String>,
    city: Option<String>,
    country: Option<String>,
}

impl Party {
    /// Creates a party known only by its trading name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            party_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Sets the legal registration name and returns the updated party.
    pub fn with_registration_name(mut self, name: impl Into<Option<String>>) -> Self {
        self.registration_name = name.into();
        self
    }

    /// Sets the tax identifier and returns the updated party.
    pub fn with_tax_id(mut self, tax_id: impl Into<Option<String>>) -> Self {
        self.tax_id = tax_id.into();
        self
    }

    /// Name shown for the party: the legal registration name when present, otherwise the
    /// trading name, otherwise an empty string.
    pub fn display_name(&self) -> String {
        self.registration_name
            .as_deref()
            .or(self.party_name.as_deref())
            .unwrap_or_default()
            .to_owned()
    }

    pub fn tax_id(&self) -> Option<&str> {
        self.tax_id.as_deref()
    }

    /// Single-line postal address assembled from the available parts.
    pub fn address(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.street, &self.city, &self.country]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// One invoiced line item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvoiceLine {
    pub id: String,
    pub name: String,
    pub quantity: String,
    pub unit_code: Option<String>,
    pub unit_price: Option<String>,
    pub line_amount: String,
}

/// Owned invoice data extracted from a UBL `Invoice` or `CreditNote` document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Invoice {
    pub id: String,
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    pub currency: Option<String>,
    pub note: Option<String>,
    pub supplier: Party,
    pub customer: Party,
    pub lines: Vec<InvoiceLine>,
    pub tax_amount: Option<String>,
    pub payable_amount: Option<String>,
}

impl Invoice {
    /// Creates an empty invoice with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets the supplier party and returns the updated invoice.
    pub fn with_supplier(mut self, supplier: Party) -> Self {
        self.supplier = supplier;
        self
    }

    /// Sets the customer party and returns the updated invoice.
    pub fn with_customer(mut self, customer: Party) -> Self {
        self.customer = customer;
        self
    }

    /// Appends a line item and returns the updated invoice.
    pub fn with_line(mut self, line: InvoiceLine) -> Self {
        self.lines.push(line);
        self
    }

    /// Parses a UBL `Invoice` or `CreditNote` document.
    pub fn from_ubl(xml: &str) -> Result<Self, InvoiceError> {
        let document = roxmltree::Document::parse(xml)?;
        let root = document.root_element();
        let (line_tag, quantity_tag) = match root.tag_name().name() {
            "Invoice" => ("InvoiceLine", "InvoicedQuantity"),
            "CreditNote" => ("CreditNoteLine", "CreditedQuantity"),
            other => return Err(InvoiceError::UnexpectedRoot(other.to_owned())),
        };

        let id = text_at(root, &["ID"]).ok_or(InvoiceError::MissingElement("cbc:ID"))?;

        let lines = children(root, line_tag)
            .map(|line| parse_line(line, quantity_tag))
            .collect();

        Ok(Self {
            id,
            issue_date: text_at(root, &["IssueDate"]),
            due_date: text_at(root, &["DueDate"]),
            currency: text_at(root, &["DocumentCurrencyCode"]),
            note: text_at(root, &["Note"]),
            supplier: parse_party(root, "AccountingSupplierParty"),
            customer: parse_party(root, "AccountingCustomerParty"),
            lines,
            tax_amount: text_at(root, &["TaxTotal", "TaxAmount"]),
            payable_amount: text_at(root, &["LegalMonetaryTotal", "PayableAmount"]),
        })
    }
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == name)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

fn descend<'a, 'input>(node: Node<'a, 'input>, path: &[&str]) -> Option<Node<'a, 'input>> {
    path.iter()
        .try_fold(node, |current, name| child(current, name))
}

fn text_at(node: Node<'_, '_>, path: &[&str]) -> Option<String> {
    descend(node, path)
        .and_then(|found| found.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

fn parse_party(root: Node<'_, '_>, role: &str) -> Party {
    let Some(party) = descend(root, &[role, "Party"]) else {
        return Party::default();
    };

    Party {
        registration_name: text_at(party, &["PartyLegalEntity", "RegistrationName"]),
        party_name: text_at(party, &["PartyName", "Name"]),
        tax_id: text_at(party, &["PartyTaxScheme", "CompanyID"]),
        street: text_at(party, &["PostalAddress", "StreetName"]),
        city: text_at(party, &["PostalAddress", "CityName"]),
        country: text_at(party, &["PostalAddress", "Country", "IdentificationCode"]),
    }
}

fn parse_line(line: Node<'_, '_>, quantity_tag: &str) -> InvoiceLine {
    let quantity = child(line, quantity_tag);
    InvoiceLine {
        id: text_at(line, &["ID"]).unwrap_or_default(),
        name: text_at(line, &["Item", "Name"]).unwrap_or_default(),
        quantity: quantity
            .and_then(|node| node.text())
            .map(|text| text.trim().to_owned())
            .unwrap_or_default(),
        unit_code: quantity
            .and_then(|node| node.attribute("unitCode"))
            .map(str::to_owned),
        unit_price: text_at(line, &["Price", "PriceAmount"]),
        line_amount: text_at(line, &["LineExtensionAmount"]).unwrap_or_default(),
    }
}
