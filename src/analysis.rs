use std::collections::BTreeMap;

use chrono::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankColor {
    First,
    Second,
    Third,
    Other,
}

impl RankColor {
    fn for_rank(rank: usize) -> Self {
        match rank {
            1 => RankColor::First,
            2 => RankColor::Second,
            3 => RankColor::Third,
            _ => RankColor::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisBar {
    pub category: String,
    pub total: Duration,
    /// 1-based position after sorting by total.
    pub rank: usize,
    pub color: RankColor,
    /// Share of the grand total in `[0, 1]`; zero when nothing was tracked.
    pub ratio: f64,
}

impl AnalysisBar {
    pub fn percent(&self) -> f64 {
        self.ratio * 100.0
    }

    pub fn bar_cells(&self, width: usize) -> usize {
        ((self.ratio * width as f64).floor() as usize).min(width)
    }
}

/// Ranks `categories` by their total in `totals`, descending. Equal totals
/// keep the order of `categories`. Categories present only in `totals` are
/// appended after the listed ones.
pub fn rank_categories(categories: &[String], totals: &BTreeMap<String, Duration>) -> Vec<AnalysisBar> {
    let mut rows = categories
        .iter()
        .map(|category| {
            (
                category.clone(),
                totals.get(category).copied().unwrap_or_else(Duration::zero),
            )
        })
        .collect::<Vec<_>>();
    for (category, total) in totals {
        if !categories.contains(category) {
            rows.push((category.clone(), *total));
        }
    }

    rows.sort_by(|left, right| right.1.cmp(&left.1));

    let grand_total_ms = rows
        .iter()
        .map(|(_, total)| total.num_milliseconds().max(0))
        .sum::<i64>();

    rows.into_iter()
        .enumerate()
        .map(|(index, (category, total))| {
            let ratio = if grand_total_ms > 0 {
                total.num_milliseconds().max(0) as f64 / grand_total_ms as f64
            } else {
                0.0
            };
            AnalysisBar {
                category,
                total,
                rank: index + 1,
                color: RankColor::for_rank(index + 1),
                ratio,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Duration;

    use super::{RankColor, rank_categories};

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn ranks_the_worked_example() {
        let categories = names(&["Exception", "Math", "English"]);
        let totals = BTreeMap::from([
            ("Math".to_string(), Duration::minutes(30)),
            ("English".to_string(), Duration::minutes(45)),
            ("Exception".to_string(), Duration::minutes(10)),
        ]);

        let bars = rank_categories(&categories, &totals);
        let order = bars.iter().map(|bar| bar.category.as_str()).collect::<Vec<_>>();
        assert_eq!(order, vec!["English", "Math", "Exception"]);
        assert_eq!(
            bars.iter().map(|bar| bar.color).collect::<Vec<_>>(),
            vec![RankColor::First, RankColor::Second, RankColor::Third]
        );
        assert_eq!(bars[0].percent().round(), 53.0);
        assert_eq!(bars[1].percent().round(), 35.0);
        assert_eq!(bars[2].percent().round(), 12.0);
    }

    #[test]
    fn ties_keep_input_order_and_extra_categories_follow() {
        let categories = names(&["Korean", "Math", "Science", "Social", "Art"]);
        let totals = BTreeMap::from([
            ("Math".to_string(), Duration::minutes(20)),
            ("Korean".to_string(), Duration::minutes(20)),
            ("Science".to_string(), Duration::minutes(5)),
            ("Retired".to_string(), Duration::minutes(5)),
        ]);

        let bars = rank_categories(&categories, &totals);
        let order = bars.iter().map(|bar| bar.category.as_str()).collect::<Vec<_>>();
        assert_eq!(order, vec!["Korean", "Math", "Science", "Retired", "Social", "Art"]);
        assert!(bars[3..].iter().all(|bar| bar.color == RankColor::Other));
    }

    #[test]
    fn widths_never_exceed_container_and_never_increase() {
        let categories = names(&["A", "B", "C", "D", "E"]);
        let totals = BTreeMap::from([
            ("A".to_string(), Duration::seconds(7)),
            ("B".to_string(), Duration::seconds(13)),
            ("C".to_string(), Duration::seconds(1)),
            ("D".to_string(), Duration::seconds(13)),
            ("E".to_string(), Duration::seconds(3)),
        ]);

        let bars = rank_categories(&categories, &totals);
        let ratio_sum = bars.iter().map(|bar| bar.ratio).sum::<f64>();
        assert!(ratio_sum <= 1.0 + 1e-9);
        for width in [10, 37, 80] {
            let cells = bars.iter().map(|bar| bar.bar_cells(width)).collect::<Vec<_>>();
            assert!(cells.iter().sum::<usize>() <= width);
            assert!(cells.windows(2).all(|pair| pair[0] >= pair[1]));
        }
    }

    #[test]
    fn zero_grand_total_renders_empty_bars() {
        let bars = rank_categories(&names(&["Math", "English"]), &BTreeMap::new());
        assert_eq!(bars.len(), 2);
        assert!(bars.iter().all(|bar| bar.ratio == 0.0 && bar.bar_cells(40) == 0));
    }
}
