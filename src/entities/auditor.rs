//! Auditors: expenditure review, findings, recommendations and the
//! auditor's own performance rating.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::sha256_hex;
use crate::transactions::{verify_gstin, ExpenditureTransaction};

/// Outcome of a single audit, appended to the auditor's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    pub audit_id: String,
    pub expenditure_id: String,
    pub auditor_id: String,
    pub timestamp: DateTime<Utc>,
    pub compliance_score: f64,
    pub findings: Vec<String>,
    pub recommendation: String,
    pub audit_notes: String,
    pub signature: String,
}

impl AuditResult {
    /// Buckets whose text starts with "Approve" count as approvals, both
    /// for the admission gate and for rating arithmetic.
    pub fn is_approval(&self) -> bool {
        self.recommendation.starts_with("Approve")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditorStats {
    pub auditor_id: String,
    pub name: String,
    pub verified: bool,
    pub specializations: Vec<String>,
    pub rating: f64,
    pub total_audits: usize,
    pub approved_audits: usize,
    pub approval_rate: f64,
    pub average_compliance_score: f64,
    pub member_since: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auditor {
    pub auditor_id: String,
    pub name: String,
    pub credentials: Value,
    pub specializations: Vec<String>,
    pub verified: bool,
    pub audit_history: Vec<AuditResult>,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub public_key: String,
    pub verification_authority: Option<String>,
    pub verification_date: Option<DateTime<Utc>>,
}

impl Auditor {
    pub fn new(
        auditor_id: &str,
        name: &str,
        credentials: Value,
        specializations: Vec<String>,
    ) -> Self {
        let public_key = sha256_hex(format!("{auditor_id}{name}").as_bytes());
        Self {
            auditor_id: auditor_id.to_owned(),
            name: name.to_owned(),
            credentials,
            specializations,
            verified: false,
            audit_history: Vec::new(),
            rating: 5.0,
            created_at: Utc::now(),
            public_key,
            verification_authority: None,
            verification_date: None,
        }
    }

    pub fn verify_credentials(&mut self, verification_authority: &str) {
        self.verified = true;
        self.verification_authority = Some(verification_authority.to_owned());
        self.verification_date = Some(Utc::now());
    }

    /// Review an expenditure: derive findings and a recommendation from its
    /// documentation, sign the result and append it to the audit history.
    pub fn audit_expenditure(
        &mut self,
        expenditure: &ExpenditureTransaction,
        audit_notes: &str,
    ) -> AuditResult {
        let id_prefix: String = self.auditor_id.chars().take(8).collect();
        let audit_id = format!("AUD-{}-{}", Utc::now().timestamp(), id_prefix);

        let findings = self.generate_findings(expenditure);
        let recommendation = recommendation_for_score(expenditure.compliance_score).to_owned();
        let signature = sha256_hex(
            format!(
                "{audit_id}{}{}",
                expenditure.transaction_id, self.auditor_id
            )
            .as_bytes(),
        );

        let result = AuditResult {
            audit_id,
            expenditure_id: expenditure.transaction_id.clone(),
            auditor_id: self.auditor_id.clone(),
            timestamp: Utc::now(),
            compliance_score: expenditure.compliance_score,
            findings,
            recommendation,
            audit_notes: audit_notes.to_owned(),
            signature,
        };
        self.audit_history.push(result.clone());
        result
    }

    fn generate_findings(&self, expenditure: &ExpenditureTransaction) -> Vec<String> {
        let mut findings = Vec::new();
        let invoice = &expenditure.invoice_details;

        if !verify_gstin(&invoice.gstin) {
            findings.push("Invalid GSTIN format".to_string());
        }
        if invoice.bank_transaction_id.is_empty() && invoice.cheque_number.is_empty() {
            findings.push("Missing payment proof".to_string());
        }
        if invoice.documents.is_empty() {
            findings.push("No supporting documents provided".to_string());
        }
        if expenditure.compliance_score < 80.0 {
            findings.push(format!(
                "Low compliance score: {:.1}%",
                expenditure.compliance_score
            ));
        }
        if !invoice.vendor_gstin.is_empty() && !verify_gstin(&invoice.vendor_gstin) {
            findings.push("Invalid vendor GSTIN format".to_string());
        }
        let age_days = Utc::now()
            .signed_duration_since(invoice.invoice_date)
            .num_seconds()
            / 86_400;
        if age_days > 90 {
            findings.push(format!("Invoice is older than 90 days ({age_days} days)"));
        }
        if invoice.invoice_number.is_empty() {
            findings.push("Missing invoice number".to_string());
        }
        if invoice.vendor_name.is_empty() {
            findings.push("Missing vendor name".to_string());
        }

        findings
    }

    pub fn stats(&self) -> AuditorStats {
        let total = self.audit_history.len();
        let approved = self
            .audit_history
            .iter()
            .filter(|audit| audit.is_approval())
            .count();
        let (approval_rate, average_compliance_score) = if total > 0 {
            let sum: f64 = self
                .audit_history
                .iter()
                .map(|audit| audit.compliance_score)
                .sum();
            (approved as f64 / total as f64, sum / total as f64)
        } else {
            (0.0, 0.0)
        };

        AuditorStats {
            auditor_id: self.auditor_id.clone(),
            name: self.name.clone(),
            verified: self.verified,
            specializations: self.specializations.clone(),
            rating: self.rating,
            total_audits: total,
            approved_audits: approved,
            approval_rate,
            average_compliance_score,
            member_since: self.created_at,
        }
    }

    pub fn recent_audits(&self, limit: usize) -> Vec<AuditResult> {
        let start = self.audit_history.len().saturating_sub(limit);
        self.audit_history[start..].to_vec()
    }

    pub fn audits_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<AuditResult> {
        self.audit_history
            .iter()
            .filter(|audit| audit.timestamp >= from && audit.timestamp <= to)
            .cloned()
            .collect()
    }

    pub fn audit_by_id(&self, audit_id: &str) -> Option<&AuditResult> {
        self.audit_history
            .iter()
            .find(|audit| audit.audit_id == audit_id)
    }

    /// Recompute the auditor's rating from approval rate, mean compliance,
    /// experience and verification, clamped to [1.0, 5.0]. An empty history
    /// pins the rating at 5.0.
    pub fn update_rating(&mut self) -> f64 {
        if self.audit_history.is_empty() {
            self.rating = 5.0;
            return self.rating;
        }

        let mut rating: f64 = 5.0;
        let stats = self.stats();

        if stats.approval_rate > 0.8 {
            rating += 0.2;
        } else if stats.approval_rate < 0.3 {
            rating -= 0.5;
        }

        if stats.average_compliance_score > 80.0 {
            rating += 0.3;
        } else if stats.average_compliance_score < 60.0 {
            rating -= 0.3;
        }

        if stats.total_audits > 100 {
            rating += 0.2;
        } else if stats.total_audits > 50 {
            rating += 0.1;
        }

        if self.verified {
            rating += 0.3;
        }

        self.rating = rating.clamp(1.0, 5.0);
        self.rating
    }

    pub fn has_specialization(&self, specialization: &str) -> bool {
        self.specializations
            .iter()
            .any(|spec| spec.eq_ignore_ascii_case(specialization))
    }

    pub fn add_specialization(&mut self, specialization: &str) {
        if !self.has_specialization(specialization) {
            self.specializations.push(specialization.to_owned());
        }
    }

    pub fn remove_specialization(&mut self, specialization: &str) {
        self.specializations
            .retain(|spec| !spec.eq_ignore_ascii_case(specialization));
    }
}

/// Recommendation bucket for a compliance score.
pub fn recommendation_for_score(score: f64) -> &'static str {
    match score {
        s if s >= 90.0 => "Approve - Excellent compliance",
        s if s >= 80.0 => "Approve - Good compliance with minor observations",
        s if s >= 70.0 => "Approve with conditions - Address noted observations",
        s if s >= 60.0 => "Conditional approval - Requires additional documentation",
        s if s >= 50.0 => "Review required - Significant compliance gaps",
        _ => "Reject - Insufficient compliance and documentation",
    }
}
