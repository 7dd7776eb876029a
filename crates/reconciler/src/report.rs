use signal_core::{MatchStatus, SignalLevel};

use crate::evaluation::Evaluation;

/// Markdown table of the filtered stocks, one row each, with a summary header.
pub fn render_markdown(evaluation: &Evaluation) -> String {
    let stats = &evaluation.stats;

    let status_summary = MatchStatus::ALL
        .iter()
        .map(|s| format!("{} {}", s, stats.count_by_match_status.get(s).copied().unwrap_or(0)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut lines = vec![
        "# 시그널 비교 리포트".to_string(),
        String::new(),
        format!("스냅샷: {}", evaluation.snapshot),
        String::new(),
        format!(
            "종목 {}개 / 전체 {}개 | {} | 평균 신뢰도 {:.2}",
            stats.total, evaluation.overall.total, status_summary, stats.avg_confidence
        ),
        String::new(),
        "| 종목명 | 코드 | 시장 | Vision | API | 상태 | 신뢰도 |".to_string(),
        "|--------|------|------|--------|-----|------|--------|".to_string(),
    ];

    for stock in &evaluation.filtered {
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} | {:.1} |",
            cell(&stock.stock.name),
            stock.stock.code,
            stock.stock.market,
            signal_cell(stock.vision_signal()),
            signal_cell(stock.api_signal()),
            stock.match_status,
            stock.confidence,
        ));
    }

    lines.join("\n")
}

fn signal_cell(signal: Option<SignalLevel>) -> &'static str {
    signal.map(|s| s.label()).unwrap_or("-")
}

fn cell(text: &str) -> String {
    text.replace(['\n', '\r'], " ").replace('|', "/")
}
