use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use wearguard::error::AppError;
use wearguard::screening::{
    CsvItemSource, EvaluationEngine, FileRulesetSource, RulesetStore, ScreeningService,
    SubjectId, SubjectsReport, SuppressionScope,
};

#[derive(Args, Debug)]
pub(crate) struct CheckArgs {
    /// Ruleset JSON document (`whiteList` / `blackList`)
    #[arg(long)]
    pub(crate) ruleset: PathBuf,
    /// Item export with `subject_id,item_id,name` columns
    #[arg(long)]
    pub(crate) items: PathBuf,
    /// Subject to screen; repeat for several. Defaults to every subject in the export.
    #[arg(long = "subject")]
    pub(crate) subjects: Vec<u64>,
    /// Whitelist suppression scope: `name` or `span`
    #[arg(long, default_value = "name", value_parser = parse_scope)]
    pub(crate) scope: SuppressionScope,
    /// Print the report as JSON instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

fn parse_scope(raw: &str) -> Result<SuppressionScope, String> {
    SuppressionScope::parse(raw).ok_or_else(|| format!("unknown scope '{raw}' (expected name or span)"))
}

pub(crate) async fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let CheckArgs {
        ruleset,
        items,
        subjects,
        scope,
        json,
    } = args;

    let items = CsvItemSource::from_path(&items)?;
    let subjects: Vec<SubjectId> = if subjects.is_empty() {
        items.subjects()
    } else {
        subjects.into_iter().map(SubjectId).collect()
    };

    let service = ScreeningService::with_engine(
        Arc::new(items),
        Arc::new(RulesetStore::new(FileRulesetSource::new(ruleset))),
        EvaluationEngine::new(scope),
    );
    let report = service.check_subjects(&subjects).await?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&report).map_err(|err| AppError::Io(err.into()))?;
        println!("{rendered}");
    } else {
        print!("{}", render_summary(&report, subjects.len()));
    }
    Ok(())
}

fn render_summary(report: &SubjectsReport, requested: usize) -> String {
    let mut out = format!(
        "Screened {} of {} subjects | total score {}\n",
        report.per_user.len(),
        requested,
        report.total_score
    );
    for subject in &report.per_user {
        out.push_str(&format!(
            "- subject {}: score {} ({} matches)\n",
            subject.subject_id,
            subject.score,
            subject.matches.len()
        ));
        for hit in &subject.matches {
            out.push_str(&format!(
                "    {} (item {}): '{}' via pattern '{}' [{:+}]\n",
                hit.item.name, hit.item.id, hit.matched_text, hit.pattern, hit.score
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wearguard::screening::{Item, Match, SubjectScore};

    #[test]
    fn summary_lists_scored_subjects() {
        let report = SubjectsReport {
            per_user: vec![SubjectScore {
                subject_id: SubjectId(7),
                score: 10.0,
                matches: vec![Match {
                    item: Item::new(70, "Shotgun"),
                    pattern: "gun".to_string(),
                    matched_text: "gun".to_string(),
                    score: 10.0,
                }],
            }],
            total_score: 10.0,
        };

        let summary = render_summary(&report, 3);

        assert!(summary.starts_with("Screened 1 of 3 subjects | total score 10"));
        assert!(summary.contains("- subject 7: score 10 (1 matches)"));
        assert!(summary.contains("Shotgun (item 70): 'gun' via pattern 'gun' [+10]"));
    }

    #[test]
    fn summary_signs_negative_points() {
        let report = SubjectsReport {
            per_user: vec![SubjectScore {
                subject_id: SubjectId(3),
                score: -2.0,
                matches: vec![Match {
                    item: Item::new(30, "Golden Halo"),
                    pattern: "halo".to_string(),
                    matched_text: "Halo".to_string(),
                    score: -2.0,
                }],
            }],
            total_score: -2.0,
        };

        let summary = render_summary(&report, 1);

        assert!(summary.contains("Golden Halo (item 30): 'Halo' via pattern 'halo' [-2]"));
        assert!(!summary.contains("+-"));
    }

    #[tokio::test]
    async fn check_runs_against_local_files() {
        use std::io::Write;

        let mut ruleset = tempfile::NamedTempFile::new().expect("temp file");
        write!(ruleset, r#"{{"blackList":[{{"pattern":"gun","points":10}}]}}"#)
            .expect("write ruleset");
        let mut items = tempfile::NamedTempFile::new().expect("temp file");
        write!(items, "subject_id,item_id,name\n1,10,Shotgun\n").expect("write items");

        let result = run_check(CheckArgs {
            ruleset: ruleset.path().to_path_buf(),
            items: items.path().to_path_buf(),
            subjects: Vec::new(),
            scope: SuppressionScope::Name,
            json: true,
        })
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn check_surfaces_missing_ruleset() {
        let mut items = tempfile::NamedTempFile::new().expect("temp file");
        {
            use std::io::Write;
            write!(items, "subject_id,item_id,name\n1,10,Shotgun\n").expect("write items");
        }

        let result = run_check(CheckArgs {
            ruleset: PathBuf::from("/nonexistent/wearguard/ruleset.json"),
            items: items.path().to_path_buf(),
            subjects: vec![1],
            scope: SuppressionScope::Name,
            json: false,
        })
        .await;

        assert!(matches!(result, Err(AppError::Screening(_))));
    }
}
