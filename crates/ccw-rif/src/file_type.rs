//! The closed set of RIF file kinds and their static column metadata

use crate::error::{Result, RifError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column carrying the INSERT/UPDATE/DELETE intent of every row
pub const RECORD_ACTION_COLUMN: &str = "DML_IND";

/// Grouping column shared by every claim file
pub const CLAIM_ID_COLUMN: &str = "CLM_ID";

const BENEFICIARY_COLUMNS: &[&str] = &[
    "DML_IND",
    "BENE_ID",
    "STATE_CODE",
    "BENE_COUNTY_CD",
    "BENE_ZIP_CD",
    "BENE_BIRTH_DT",
    "BENE_SEX_IDENT_CD",
    "BENE_RACE_CD",
    "BENE_ENTLMT_RSN_ORIG",
    "BENE_CRNT_HIC_NUM",
    "MBI_NUM",
    "BENE_SRNM_NAME",
    "BENE_GVN_NAME",
    "BENE_MDL_NAME",
    "BENE_DEATH_DT",
    "RFRNC_YR",
];

const BENEFICIARY_HISTORY_COLUMNS: &[&str] = &[
    "DML_IND",
    "BENE_ID",
    "BENE_BIRTH_DT",
    "BENE_SEX_IDENT_CD",
    "BENE_CRNT_HIC_NUM",
    "MBI_NUM",
    "EFCTV_BGN_DT",
    "EFCTV_END_DT",
];

const PDE_COLUMNS: &[&str] = &[
    "DML_IND",
    "PDE_ID",
    "BENE_ID",
    "SRVC_DT",
    "PD_DT",
    "SRVC_PRVDR_ID",
    "PRSCRBR_ID",
    "PROD_SRVC_ID",
    "QTY_DSPNSD_NUM",
    "DAYS_SUPLY_NUM",
    "FILL_NUM",
    "TOT_RX_CST_AMT",
];

const PROFESSIONAL_CLAIM_COLUMNS: &[&str] = &[
    "DML_IND",
    "BENE_ID",
    "CLM_ID",
    "CLM_GRP_ID",
    "NCH_CLM_TYPE_CD",
    "CLM_FROM_DT",
    "CLM_THRU_DT",
    "CLM_PMT_AMT",
    "PRNCPAL_DGNS_CD",
    "LINE_NUM",
    "HCPCS_CD",
    "LINE_NCH_PMT_AMT",
    "LINE_1ST_EXPNS_DT",
];

const INSTITUTIONAL_CLAIM_COLUMNS: &[&str] = &[
    "DML_IND",
    "BENE_ID",
    "CLM_ID",
    "CLM_GRP_ID",
    "NCH_CLM_TYPE_CD",
    "CLM_FROM_DT",
    "CLM_THRU_DT",
    "CLM_PMT_AMT",
    "PRNCPAL_DGNS_CD",
    "PRVDR_NUM",
    "CLM_TOT_CHRG_AMT",
    "CLM_LINE_NUM",
    "REV_CNTR",
    "HCPCS_CD",
    "REV_CNTR_PMT_AMT_AMT",
    "REV_CNTR_DT",
];

/// How a claim file lays out its line-level columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimLayout {
    /// Carrier and DME: one row per billed line item
    Professional,
    /// Facility claims: one row per revenue center
    Institutional,
}

/// A kind of RIF file, in declaration order
///
/// Declaration order is significant: it is the tie-breaker used when ordering
/// the files of a data set for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RifFileType {
    Beneficiary,
    BeneficiaryHistory,
    Pde,
    Carrier,
    Inpatient,
    Outpatient,
    Snf,
    Hospice,
    Hha,
    Dme,
}

impl RifFileType {
    pub const ALL: [RifFileType; 10] = [
        RifFileType::Beneficiary,
        RifFileType::BeneficiaryHistory,
        RifFileType::Pde,
        RifFileType::Carrier,
        RifFileType::Inpatient,
        RifFileType::Outpatient,
        RifFileType::Snf,
        RifFileType::Hospice,
        RifFileType::Hha,
        RifFileType::Dme,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RifFileType::Beneficiary => "BENEFICIARY",
            RifFileType::BeneficiaryHistory => "BENEFICIARY_HISTORY",
            RifFileType::Pde => "PDE",
            RifFileType::Carrier => "CARRIER",
            RifFileType::Inpatient => "INPATIENT",
            RifFileType::Outpatient => "OUTPATIENT",
            RifFileType::Snf => "SNF",
            RifFileType::Hospice => "HOSPICE",
            RifFileType::Hha => "HHA",
            RifFileType::Dme => "DME",
        }
    }

    /// Position in declaration order
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Beneficiary files must be persisted before any claim that references them
    pub fn is_beneficiary_type(self) -> bool {
        matches!(self, RifFileType::Beneficiary | RifFileType::BeneficiaryHistory)
    }

    /// Column whose value is shared by all rows of one logical record, if any
    pub fn id_column(self) -> Option<&'static str> {
        self.claim_layout().map(|_| CLAIM_ID_COLUMN)
    }

    pub fn claim_layout(self) -> Option<ClaimLayout> {
        match self {
            RifFileType::Beneficiary | RifFileType::BeneficiaryHistory | RifFileType::Pde => None,
            RifFileType::Carrier | RifFileType::Dme => Some(ClaimLayout::Professional),
            RifFileType::Inpatient
            | RifFileType::Outpatient
            | RifFileType::Snf
            | RifFileType::Hospice
            | RifFileType::Hha => Some(ClaimLayout::Institutional),
        }
    }

    /// Columns this file type is mapped from, in file order
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            RifFileType::Beneficiary => BENEFICIARY_COLUMNS,
            RifFileType::BeneficiaryHistory => BENEFICIARY_HISTORY_COLUMNS,
            RifFileType::Pde => PDE_COLUMNS,
            _ => match self.claim_layout() {
                Some(ClaimLayout::Professional) => PROFESSIONAL_CLAIM_COLUMNS,
                _ => INSTITUTIONAL_CLAIM_COLUMNS,
            },
        }
    }
}

impl fmt::Display for RifFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RifFileType {
    type Err = RifError;

    fn from_str(s: &str) -> Result<Self> {
        RifFileType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RifError::UnknownFileType(s.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for file_type in RifFileType::ALL {
            assert_eq!(file_type.as_str().parse::<RifFileType>().unwrap(), file_type);
            let json = serde_json::to_string(&file_type).unwrap();
            assert_eq!(json, format!("\"{}\"", file_type.as_str()));
        }
        assert!("CLAIMS".parse::<RifFileType>().is_err());
    }

    #[test]
    fn test_grouping_columns() {
        assert_eq!(RifFileType::Beneficiary.id_column(), None);
        assert_eq!(RifFileType::Pde.id_column(), None);
        assert_eq!(RifFileType::Carrier.id_column(), Some("CLM_ID"));
        assert_eq!(RifFileType::Hha.id_column(), Some("CLM_ID"));
    }

    #[test]
    fn test_every_type_maps_action_and_bene_columns() {
        for file_type in RifFileType::ALL {
            let columns = file_type.columns();
            assert!(columns.contains(&RECORD_ACTION_COLUMN), "{}", file_type);
            assert!(columns.contains(&"BENE_ID"), "{}", file_type);
            if let Some(id) = file_type.id_column() {
                assert!(columns.contains(&id), "{}", file_type);
            }
        }
    }

    #[test]
    fn test_ordinals_follow_declaration_order() {
        let ordinals: Vec<usize> = RifFileType::ALL.iter().map(|t| t.ordinal()).collect();
        assert_eq!(ordinals, (0..10).collect::<Vec<_>>());
        assert!(RifFileType::Beneficiary.is_beneficiary_type());
        assert!(RifFileType::BeneficiaryHistory.is_beneficiary_type());
        assert!(!RifFileType::Pde.is_beneficiary_type());
    }
}
