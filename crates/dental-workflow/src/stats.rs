//! 诊所统计

use dental_core::Result;
use dental_database::Repositories;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// 诊所概况
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PracticeOverview {
    pub total_patients: i64,
    pub patients_by_status: BTreeMap<String, i64>,
    pub treatments_by_status: BTreeMap<String, i64>,
    pub analyses_by_status: BTreeMap<String, i64>,
    /// 等待中和处理中的分析数
    pub open_analyses: i64,
}

/// 统计服务
#[derive(Debug)]
pub struct StatsService {
    repos: Repositories,
}

impl StatsService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn overview(&self) -> Result<PracticeOverview> {
        let patients = self.repos.patients.count_patients_by_status().await?;
        let treatments = self.repos.treatments.count_treatments_by_status(None).await?;
        let analyses = self.repos.analyses.count_analyses_by_status().await?;

        let open_analyses = analyses
            .iter()
            .filter(|(status, _)| status.is_active())
            .map(|(_, count)| count)
            .sum();

        Ok(PracticeOverview {
            total_patients: patients.iter().map(|(_, count)| count).sum(),
            patients_by_status: by_name(patients),
            treatments_by_status: by_name(treatments),
            analyses_by_status: by_name(analyses),
            open_analyses,
        })
    }
}

fn by_name<S: Debug>(counts: Vec<(S, i64)>) -> BTreeMap<String, i64> {
    counts
        .into_iter()
        .map(|(status, count)| (format!("{:?}", status), count))
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::state_machine::PatientEvent;
    use crate::testing::*;
    use dental_core::*;

    #[tokio::test]
    async fn test_empty_practice() {
        let (engine, _dir) = engine();
        let overview = engine.stats().overview().await.unwrap();
        assert_eq!(overview.total_patients, 0);
        assert_eq!(overview.open_analyses, 0);
        assert!(overview.treatments_by_status.is_empty());
    }

    #[tokio::test]
    async fn test_counts_by_status() {
        let (engine, _dir) = engine();
        let (_patient, _treatment, photo) = seeded_photo(&engine).await;
        let other = engine
            .patients()
            .create(patient_request("Second", "Patient"))
            .await
            .unwrap();
        engine
            .patients()
            .change_status(other.id, PatientEvent::Deactivate)
            .await
            .unwrap();
        engine
            .analyses()
            .request(
                photo.id,
                CreateAnalysisRequest {
                    analysis_type: AnalysisType::Periodontal,
                    model_version: None,
                },
            )
            .await
            .unwrap();

        let overview = engine.stats().overview().await.unwrap();
        assert_eq!(overview.total_patients, 2);
        assert_eq!(overview.patients_by_status.get("Active"), Some(&1));
        assert_eq!(overview.patients_by_status.get("Inactive"), Some(&1));
        assert_eq!(overview.treatments_by_status.get("Planned"), Some(&1));
        assert_eq!(overview.analyses_by_status.get("Pending"), Some(&1));
        assert_eq!(overview.open_analyses, 1);
    }
}
