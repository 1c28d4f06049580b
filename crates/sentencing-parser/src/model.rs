use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Jurisdictions the import pipeline knows about.
///
/// `US_IX` is the upstream code for Idaho's second data system; it is folded
/// into `US_ID` both in object prefixes and in record payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateCode {
    #[serde(rename = "US_ID", alias = "US_IX")]
    UsId,
    #[serde(rename = "US_ND")]
    UsNd,
}

impl StateCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateCode::UsId => "US_ID",
            StateCode::UsNd => "US_ND",
        }
    }
}

impl FromStr for StateCode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "US_ID" | "US_IX" => Ok(StateCode::UsId),
            "US_ND" => Ok(StateCode::UsNd),
            other => Err(format!("unknown state code '{other}'")),
        }
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(Gender {
    Male => "MALE",
    Female => "FEMALE",
    NonBinary => "NON_BINARY",
    Trans => "TRANS",
    TransFemale => "TRANS_FEMALE",
    TransMale => "TRANS_MALE",
    ExternalUnknown => "EXTERNAL_UNKNOWN",
    InternalUnknown => "INTERNAL_UNKNOWN",
});

impl Gender {
    pub fn is_known(&self) -> bool {
        !matches!(self, Gender::ExternalUnknown | Gender::InternalUnknown)
    }
}

string_enum!(
    /// Gender eligibility as written in the community opportunity export.
    OpportunityGender {
        Women => "Women",
        Men => "Men",
    }
);

impl From<OpportunityGender> for Gender {
    fn from(value: OpportunityGender) -> Self {
        match value {
            OpportunityGender::Women => Gender::Female,
            OpportunityGender::Men => Gender::Male,
        }
    }
}

string_enum!(
    /// Report type labels as they appear in the case export.
    ExternalReportType {
        PsiAssignedFull => "PSI Assigned Full",
        PsiFileReviewAssigned => "PSI File Review Assigned",
        PsiFileReviewWithLsiAssigned => "PSI File Review w/LSI Assigned",
    }
);

string_enum!(NeedToBeAddressed {
    AngerManagement => "AngerManagement",
    CaseManagement => "CaseManagement",
    ClothingAndToiletries => "ClothingAndToiletries",
    DomesticViolenceIssues => "DomesticViolenceIssues",
    Education => "Education",
    FamilyServices => "FamilyServices",
    FinancialAssistance => "FinancialAssistance",
    FoodInsecurity => "FoodInsecurity",
    GeneralReEntrySupport => "GeneralReEntrySupport",
    Healthcare => "Healthcare",
    HousingOpportunities => "HousingOpportunities",
    JobTrainingOrOpportunities => "JobTrainingOrOpportunities",
    MentalHealth => "MentalHealth",
    SubstanceUse => "SubstanceUse",
    Transportation => "Transportation",
    Other => "Other",
});

string_enum!(PriorCriminalHistoryCriterion {
    None => "None",
    Significant => "Significant",
});

string_enum!(DiagnosedMentalHealthDiagnosisCriterion {
    Any => "Any",
    BipolarDisorder => "BipolarDisorder",
    BorderlinePersonalityDisorder => "BorderlinePersonalityDisorder",
    DelusionalDisorder => "DelusionalDisorder",
    MajorDepressiveDisorder => "MajorDepressiveDisorder",
    PsychoticDisorderNotOtherwiseSpecified => "PsychoticDisorderNotOtherwiseSpecified",
    Schizophrenia => "Schizophrenia",
    SchizoaffectiveDisorder => "SchizoaffectiveDisorder",
    Other => "Other",
});

string_enum!(AsamLevelOfCareRecommendationCriterion {
    Any => "Any",
    LongTermRemissionMonitoring => "LongTermRemissionMonitoring",
    OutpatientTherapy => "OutpatientTherapy",
    MedicallyManagedOutpatient => "MedicallyManagedOutpatient",
    IntensiveOutpatient => "IntensiveOutpatient",
    HighIntensityOutpatient => "HighIntensityOutpatient",
    MedicallyManagedIntensiveOutpatient => "MedicallyManagedIntensiveOutpatient",
    ClinicallyManagedLowIntensityResidential => "ClinicallyManagedLowIntensityResidential",
    ClinicallyManagedHighIntensityResidential => "ClinicallyManagedHighIntensityResidential",
    MedicallyManagedResidential => "MedicallyManagedResidential",
    MedicallyManagedInpatient => "MedicallyManagedInpatient",
});

string_enum!(DiagnosedSubstanceUseDisorderCriterion {
    Any => "Any",
    Mild => "Mild",
    Moderate => "Moderate",
    Severe => "Severe",
});

/// Structured person name carried as a JSON-encoded string in staff and
/// client exports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FullName {
    pub given_names: String,
    pub middle_names: String,
    pub name_suffix: String,
    pub surname: String,
}

impl FullName {
    /// Single display string; empty parts are skipped.
    pub fn display_name(&self) -> String {
        [
            &self.given_names,
            &self.middle_names,
            &self.surname,
            &self.name_suffix,
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}
