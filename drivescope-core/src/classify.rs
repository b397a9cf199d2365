// Internal vs. external sharing classification

use crate::model::{AccessEntry, PrincipalType, SharingStatus};

/// Decide the sharing status of one resource from its access entries.
///
/// Domain grants to a company domain mark the resource as shared with the
/// organization. Grants to anyone, to foreign domains and to users whose email
/// domain is foreign each count as one external share. Entries without the
/// identifier their type needs are skipped.
pub fn classify_sharing(entries: &[AccessEntry], company_domains: &[String]) -> SharingStatus {
    if entries.is_empty() {
        return SharingStatus::None;
    }

    let mut internal_domain = false;
    let mut external = 0usize;

    for entry in entries {
        match entry.principal {
            PrincipalType::Anyone => external += 1,
            PrincipalType::Domain => {
                let Some(domain) = entry.domain.as_deref() else {
                    continue;
                };
                if is_company_domain(domain, company_domains) {
                    internal_domain = true;
                } else {
                    external += 1;
                }
            }
            PrincipalType::User => {
                let Some(domain) = entry.email.as_deref().and_then(email_domain) else {
                    continue;
                };
                if !is_company_domain(domain, company_domains) {
                    external += 1;
                }
            }
        }
    }

    if !internal_domain && external == 0 {
        SharingStatus::None
    } else {
        SharingStatus::Shared {
            internal_domain,
            external,
        }
    }
}

fn email_domain(email: &str) -> Option<&str> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim())
        .filter(|domain| !domain.is_empty())
}

fn is_company_domain(domain: &str, company_domains: &[String]) -> bool {
    company_domains
        .iter()
        .any(|company| company.trim().eq_ignore_ascii_case(domain.trim()))
}
