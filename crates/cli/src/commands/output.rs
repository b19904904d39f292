//! Table and JSON rendering of opportunity reports.

use anyhow::Result;
use serde::Serialize;

use evscan_engine::{EvSummary, Opportunity, OpportunityReport, PipelineStats};

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: chrono::DateTime<chrono::Utc>,
    stats: &'a PipelineStats,
    opportunities: &'a [Opportunity],
}

fn limited(report: &OpportunityReport, limit: Option<usize>) -> &[Opportunity] {
    let end = limit.map_or(report.opportunities.len(), |n| n.min(report.opportunities.len()));
    &report.opportunities[..end]
}

/// One-line count of opportunities by classification.
#[must_use]
pub fn summary_line(report: &OpportunityReport) -> String {
    let summary: EvSummary = report.opportunities.iter().map(|o| o.classification).collect();
    format!(
        "{} opportunities ({} take, {} marginal, {} no ev) from {} events, {} markets analyzed, {} failed",
        report.opportunities.len(),
        summary.take,
        summary.marginal,
        summary.no_ev,
        report.stats.events_seen,
        report.stats.markets_analyzed,
        report.stats.markets_failed,
    )
}

/// Prints the report as pretty JSON.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn print_json(report: &OpportunityReport, limit: Option<usize>) -> Result<()> {
    let json = JsonReport {
        generated_at: report.generated_at,
        stats: &report.stats,
        opportunities: limited(report, limit),
    };
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Prints the report as a fixed-width table.
pub fn print_table(report: &OpportunityReport, limit: Option<usize>) {
    let rows = limited(report, limit);

    println!();
    println!("{}", "=".repeat(140));
    println!("+EV OPPORTUNITIES  (generated {})", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("{}", "=".repeat(140));

    if rows.is_empty() {
        println!("No opportunities found.");
    } else {
        println!(
            "{:<30} {:<16} {:<30} {:>8} {:<28} {:>10} {:<9}",
            "Event", "Market", "Bet", "Fair", "Best Available", "EV", "Class"
        );
        println!("{}", "-".repeat(140));
        for o in rows {
            println!(
                "{:<30} {:<16} {:<30} {:>8} {:<28} {:>10} {:<9}",
                truncate(&o.event, 30),
                truncate(&o.market_key, 16),
                truncate(&o.bet_description, 30),
                o.fair_odds,
                truncate(&o.best_available_odds, 28),
                truncate(&o.expected_value, 10),
                o.classification.as_str(),
            );
            println!("    {}", o.recommended_action);
        }
    }

    println!("{}", "-".repeat(140));
    println!("{}", summary_line(report));
    if rows.len() < report.opportunities.len() {
        println!("(showing {} of {})", rows.len(), report.opportunities.len());
    }
    println!();
}

/// Shortens `s` to `width` characters, marking the cut with `~`.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('~');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use evscan_engine::EvClass;

    fn opportunity(bet: &str, ev: f64, class: EvClass) -> Opportunity {
        Opportunity {
            event_id: "evt-1".to_string(),
            sport_key: "basketball_nba".to_string(),
            commence_time: None,
            event: "Miami Heat @ Boston Celtics".to_string(),
            market_key: "h2h".to_string(),
            outcome_name: bet.to_string(),
            bet_description: bet.to_string(),
            all_available_odds: "pinnacle: +130".to_string(),
            fair_odds: "+138".to_string(),
            best_available_odds: "betmgm: +150".to_string(),
            expected_value: format!("{:.2}%", ev * 100.0),
            ev_raw: ev,
            proposed_posting_odds: "N/A".to_string(),
            recommended_action: "Bet at betmgm".to_string(),
            classification: class,
        }
    }

    fn report() -> OpportunityReport {
        OpportunityReport {
            opportunities: vec![
                opportunity("Miami Heat", 0.05, EvClass::Take),
                opportunity("Boston Celtics", 0.01, EvClass::Marginal),
                opportunity("Over 220.5", -0.02, EvClass::NoEv),
            ],
            generated_at: Utc::now(),
            error: None,
            stats: PipelineStats {
                events_seen: 1,
                markets_analyzed: 2,
                ..PipelineStats::default()
            },
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly-10", 10), "exactly-10");
        assert_eq!(truncate("Miami Heat @ Boston Celtics", 10), "Miami Hea~");
    }

    #[test]
    fn test_limited() {
        let report = report();
        assert_eq!(limited(&report, None).len(), 3);
        assert_eq!(limited(&report, Some(1))[0].bet_description, "Miami Heat");
        assert_eq!(limited(&report, Some(10)).len(), 3);
    }

    #[test]
    fn test_summary_line() {
        let line = summary_line(&report());
        assert!(line.starts_with("3 opportunities (1 take, 1 marginal, 1 no ev)"));
        assert!(line.contains("from 1 events, 2 markets analyzed, 0 failed"));
    }
}
