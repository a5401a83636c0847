//! Typed business records and their column mappings

use super::transform::FieldReader;
use crate::error::RecordParseError;
use crate::file_type::{ClaimLayout, RifFileType};
use crate::source::SourceRow;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Beneficiary master record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub beneficiary_id: String,
    pub state_code: String,
    pub county_code: String,
    pub postal_code: Option<String>,
    pub birth_date: NaiveDate,
    pub sex: char,
    pub race: Option<char>,
    pub entitlement_code_original: Option<char>,
    /// Identity column as delivered; emptied once parsing completes
    pub hicn: Option<String>,
    pub hicn_unhashed: Option<String>,
    pub mbi: Option<String>,
    pub surname: String,
    pub given_name: String,
    pub middle_initial: Option<char>,
    pub death_date: Option<NaiveDate>,
    pub enrollment_reference_year: Option<i32>,
}

impl Beneficiary {
    pub fn from_row(row: &SourceRow) -> Result<Self, RecordParseError> {
        let mut r = FieldReader::new(row);
        let record = Self {
            beneficiary_id: r.string("BENE_ID"),
            state_code: r.string("STATE_CODE"),
            county_code: r.string("BENE_COUNTY_CD"),
            postal_code: r.opt_string("BENE_ZIP_CD"),
            birth_date: r.date("BENE_BIRTH_DT"),
            sex: r.char("BENE_SEX_IDENT_CD"),
            race: r.opt_char("BENE_RACE_CD"),
            entitlement_code_original: r.opt_char("BENE_ENTLMT_RSN_ORIG"),
            hicn: r.opt_string("BENE_CRNT_HIC_NUM"),
            hicn_unhashed: None,
            mbi: r.opt_string("MBI_NUM"),
            surname: r.string("BENE_SRNM_NAME"),
            given_name: r.string("BENE_GVN_NAME"),
            middle_initial: r.opt_char("BENE_MDL_NAME"),
            death_date: r.opt_date("BENE_DEATH_DT"),
            enrollment_reference_year: r.opt_int("RFRNC_YR"),
        };
        r.finish(record)
    }

    /// Move the delivered identity value into `hicn_unhashed`
    pub fn relocate_unhashed_hicn(&mut self) {
        self.hicn_unhashed = self.hicn.take();
    }
}

/// One historical identity period of a beneficiary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeneficiaryHistory {
    pub beneficiary_id: String,
    pub birth_date: NaiveDate,
    pub sex: char,
    pub hicn: Option<String>,
    pub mbi: Option<String>,
    pub effective_begin_date: Option<NaiveDate>,
    pub effective_end_date: Option<NaiveDate>,
}

impl BeneficiaryHistory {
    pub fn from_row(row: &SourceRow) -> Result<Self, RecordParseError> {
        let mut r = FieldReader::new(row);
        let record = Self {
            beneficiary_id: r.string("BENE_ID"),
            birth_date: r.date("BENE_BIRTH_DT"),
            sex: r.char("BENE_SEX_IDENT_CD"),
            hicn: r.opt_string("BENE_CRNT_HIC_NUM"),
            mbi: r.opt_string("MBI_NUM"),
            effective_begin_date: r.opt_date("EFCTV_BGN_DT"),
            effective_end_date: r.opt_date("EFCTV_END_DT"),
        };
        r.finish(record)
    }
}

/// Part D prescription drug event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartDEvent {
    pub event_id: String,
    pub beneficiary_id: String,
    pub prescription_fill_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub service_provider_id: String,
    pub prescriber_id: String,
    pub national_drug_code: String,
    pub quantity_dispensed: BigDecimal,
    pub days_supply: i32,
    pub fill_number: i32,
    pub total_prescription_cost: BigDecimal,
}

impl PartDEvent {
    pub fn from_row(row: &SourceRow) -> Result<Self, RecordParseError> {
        let mut r = FieldReader::new(row);
        let record = Self {
            event_id: r.string("PDE_ID"),
            beneficiary_id: r.string("BENE_ID"),
            prescription_fill_date: r.date("SRVC_DT"),
            payment_date: r.opt_date("PD_DT"),
            service_provider_id: r.string("SRVC_PRVDR_ID"),
            prescriber_id: r.string("PRSCRBR_ID"),
            national_drug_code: r.string("PROD_SRVC_ID"),
            quantity_dispensed: r.decimal("QTY_DSPNSD_NUM"),
            days_supply: r.int("DAYS_SUPLY_NUM"),
            fill_number: r.int("FILL_NUM"),
            total_prescription_cost: r.decimal("TOT_RX_CST_AMT"),
        };
        r.finish(record)
    }
}

/// A line item (professional) or revenue center (institutional) of a claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimLine {
    pub line_number: i32,
    pub revenue_center_code: Option<String>,
    pub hcpcs_code: Option<String>,
    pub payment_amount: BigDecimal,
    pub service_date: Option<NaiveDate>,
}

impl ClaimLine {
    fn read(r: &mut FieldReader<'_>, layout: ClaimLayout) -> Self {
        match layout {
            ClaimLayout::Professional => Self {
                line_number: r.int("LINE_NUM"),
                revenue_center_code: None,
                hcpcs_code: r.opt_string("HCPCS_CD"),
                payment_amount: r.decimal("LINE_NCH_PMT_AMT"),
                service_date: r.opt_date("LINE_1ST_EXPNS_DT"),
            },
            ClaimLayout::Institutional => Self {
                line_number: r.int("CLM_LINE_NUM"),
                revenue_center_code: Some(r.string("REV_CNTR")),
                hcpcs_code: r.opt_string("HCPCS_CD"),
                payment_amount: r.decimal("REV_CNTR_PMT_AMT_AMT"),
                service_date: r.opt_date("REV_CNTR_DT"),
            },
        }
    }
}

/// Claim header with its lines, shared by every claim file type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_type: RifFileType,
    pub claim_id: String,
    pub beneficiary_id: String,
    pub claim_group_id: String,
    pub claim_type_code: String,
    pub date_from: NaiveDate,
    pub date_through: NaiveDate,
    pub payment_amount: BigDecimal,
    pub principal_diagnosis_code: Option<String>,
    pub provider_number: Option<String>,
    pub total_charge_amount: Option<BigDecimal>,
    pub lines: Vec<ClaimLine>,
}

impl Claim {
    /// Build one claim from its contiguous rows; header columns come from the first row
    pub fn from_rows(
        claim_type: RifFileType,
        layout: ClaimLayout,
        rows: &[SourceRow],
    ) -> Result<Self, RecordParseError> {
        let Some((first, rest)) = rows.split_first() else {
            return Err(RecordParseError {
                row_number: 0,
                message: "a claim needs at least one row".to_string(),
                errors: Vec::new(),
            });
        };

        let mut r = FieldReader::new(first);
        let institutional = layout == ClaimLayout::Institutional;
        let mut claim = Self {
            claim_type,
            claim_id: r.string("CLM_ID"),
            beneficiary_id: r.string("BENE_ID"),
            claim_group_id: r.string("CLM_GRP_ID"),
            claim_type_code: r.string("NCH_CLM_TYPE_CD"),
            date_from: r.date("CLM_FROM_DT"),
            date_through: r.date("CLM_THRU_DT"),
            payment_amount: r.decimal("CLM_PMT_AMT"),
            principal_diagnosis_code: r.opt_string("PRNCPAL_DGNS_CD"),
            provider_number: if institutional { Some(r.string("PRVDR_NUM")) } else { None },
            total_charge_amount: if institutional { Some(r.decimal("CLM_TOT_CHRG_AMT")) } else { None },
            lines: Vec::with_capacity(rows.len()),
        };

        claim.lines.push(ClaimLine::read(&mut r, layout));
        for row in rest {
            let mut line_reader = FieldReader::new(row);
            claim.lines.push(ClaimLine::read(&mut line_reader, layout));
            r.absorb(line_reader);
        }

        r.finish(claim)
    }
}

/// Any parsed record, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record")]
pub enum RifRecord {
    Beneficiary(Beneficiary),
    BeneficiaryHistory(BeneficiaryHistory),
    PartDEvent(PartDEvent),
    Claim(Claim),
}

impl RifRecord {
    pub fn beneficiary_id(&self) -> &str {
        match self {
            RifRecord::Beneficiary(b) => &b.beneficiary_id,
            RifRecord::BeneficiaryHistory(h) => &h.beneficiary_id,
            RifRecord::PartDEvent(e) => &e.beneficiary_id,
            RifRecord::Claim(c) => &c.beneficiary_id,
        }
    }

    pub fn file_type(&self) -> RifFileType {
        match self {
            RifRecord::Beneficiary(_) => RifFileType::Beneficiary,
            RifRecord::BeneficiaryHistory(_) => RifFileType::BeneficiaryHistory,
            RifRecord::PartDEvent(_) => RifFileType::Pde,
            RifRecord::Claim(c) => c.claim_type,
        }
    }

    /// Primary key of the record within its file type
    pub fn record_key(&self) -> String {
        match self {
            RifRecord::Beneficiary(b) => b.beneficiary_id.clone(),
            RifRecord::BeneficiaryHistory(h) => format!(
                "{}|{}|{}|{}",
                h.beneficiary_id,
                h.hicn.as_deref().unwrap_or(""),
                h.mbi.as_deref().unwrap_or(""),
                h.effective_begin_date.map(|d| d.to_string()).unwrap_or_default()
            ),
            RifRecord::PartDEvent(e) => e.event_id.clone(),
            RifRecord::Claim(c) => c.claim_id.clone(),
        }
    }

    pub fn as_beneficiary(&self) -> Option<&Beneficiary> {
        match self {
            RifRecord::Beneficiary(b) => Some(b),
            _ => None,
        }
    }
}
