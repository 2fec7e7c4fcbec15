//! Transient transaction objects: consumed into blocks, their payloads
//! (not the objects) are what persist.

pub mod donation;
pub mod expenditure;

pub use donation::{
    DonationStatus, DonationSummary, DonationTransaction, EBill, EBillInfo, TaxBenefit,
};
pub use expenditure::{
    verify_gstin, Attachment, AuditorValidation, ExpenditureStatus, ExpenditureTransaction,
    InvoiceDetails,
};
