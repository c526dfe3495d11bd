//! Request-for-quotation email drafts. Built locally from supplier data; no
//! model call is involved.

use crate::types::Supplier;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RfqSender {
    pub user_name: String,
    pub company_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfqDraft {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl RfqDraft {
    pub fn for_supplier(supplier: &Supplier, sender: &RfqSender) -> Self {
        let user_name = non_blank(&sender.user_name).unwrap_or("[Your Name]");
        let company_intro = non_blank(&sender.company_name).unwrap_or("[Company Name]");
        let company_signature = non_blank(&sender.company_name).unwrap_or("[Your Company]");
        let certifications = if supplier.certifications.is_empty() {
            "ISO, CE, etc.".to_string()
        } else {
            supplier.certifications.join(", ")
        };
        let material = &supplier.material_match;
        let name = &supplier.name;

        let body = format!(
            "Dear {name} Sales Team,\n\
             \n\
             I hope you are doing well. We are exploring procurement options for {material} and would like to request a formal quotation.\n\
             \n\
             Our company, {company_intro}, is interested in high-quality sourcing from reliable partners like {name}.\n\
             \n\
             Please provide the following details:\n\
             • Product specifications and data sheets\n\
             • Pricing (FOB/CIF)\n\
             • Minimum order quantity (MOQ)\n\
             • Payment terms\n\
             • Lead time from order confirmation\n\
             • Relevant certifications ({certifications})\n\
             • Packaging details and shipping dimensions\n\
             \n\
             Looking forward to your professional response.\n\
             \n\
             Best regards,\n\
             \n\
             {user_name}\n\
             {company_signature}"
        );

        Self {
            recipient: supplier.contact.trim().to_string(),
            subject: format!("Request for Quotation – {material}"),
            body,
        }
    }

    pub fn clipboard_text(&self) -> String {
        format!("Subject: {}\n\n{}", self.subject, self.body)
    }

    pub fn mailto_url(&self) -> String {
        format!(
            "mailto:{}?subject={}&body={}",
            self.recipient,
            percent_encode(&self.subject),
            percent_encode(&self.body)
        )
    }
}

fn non_blank(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|value| !value.is_empty())
}

// RFC 3986 unreserved characters pass through; everything else is %XX per
// UTF-8 byte. Spaces become %20 since mail clients show `+` literally.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
