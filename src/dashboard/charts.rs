//! Chart generation and rendering for the dashboard.
//!
//! Charts are built as ECharts options with `charming` and initialised by a
//! small script added to the page head.

use charming::{
    Chart,
    component::{Axis, Grid, Title},
    element::{AxisLabel, AxisPointer, AxisPointerType, AxisType, JsFunction, Tooltip, Trigger},
    series::bar,
};
use maud::{Markup, PreEscaped, html};

use crate::{html::HeadElement, money::Money};

/// A dashboard chart with its HTML container ID and ECharts configuration.
pub(super) struct DashboardChart {
    /// The HTML element ID to use for the chart (kebab-case)
    pub id: &'static str,
    /// The ECharts configuration as a JSON string
    pub options: String,
}

/// Renders the HTML containers for dashboard charts.
pub(super) fn charts_view(charts: &[DashboardChart]) -> Markup {
    html!(
        section
            id="charts"
            class="w-full mx-auto mb-4"
        {
            div class="grid grid-cols-1 gap-4"
            {
                @for chart in charts {
                    div
                        id=(chart.id)
                        class="min-h-[380px] rounded dark:bg-gray-100"
                    {}
                }
            }
        }
    )
}

/// Generates JavaScript initialization code for dashboard charts.
///
/// Creates scripts that initialize ECharts instances with dark mode support
/// and responsive resizing.
pub(super) fn charts_script(charts: &[DashboardChart]) -> HeadElement {
    let script_content = charts
        .iter()
        .map(|chart| {
            format!(
                r#"(function() {{
                    const chartDom = document.getElementById("{}");
                    const chart = echarts.init(chartDom);
                    const option = {};
                    chart.setOption(option);

                    window.addEventListener('resize', chart.resize);

                    const darkModeMediaQuery = window.matchMedia('(prefers-color-scheme: dark)');
                    const updateTheme = () => {{
                        const isDarkMode = darkModeMediaQuery.matches;
                        chart.setTheme(isDarkMode ? 'dark' : 'default');
                    }}
                    darkModeMediaQuery.addEventListener('change', updateTheme);
                    updateTheme();
                }})();"#,
                chart.id, chart.options
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let wrapped_script = format!(
        "document.addEventListener('DOMContentLoaded', function() {{\n{script_content}\n}});"
    );

    HeadElement::ScriptSource(PreEscaped(wrapped_script))
}

/// A bar chart of the members who spent the most in `period_label`.
///
/// `top_members` is expected to be sorted largest first.
pub(super) fn top_members_chart(top_members: &[(String, Money)], period_label: &str) -> Chart {
    let labels: Vec<String> = top_members.iter().map(|(name, _)| name.clone()).collect();
    let values: Vec<f64> = top_members.iter().map(|(_, amount)| amount.as_f64()).collect();

    Chart::new()
        .title(
            Title::new()
                .text("Maiores consumos")
                .subtext(format!("Top {} cooperados, {period_label}", top_members.len())),
        )
        .tooltip(currency_tooltip())
        .grid(
            Grid::new()
                .left("3%")
                .right("4%")
                .bottom("3%")
                .contain_label(true),
        )
        .x_axis(Axis::new().type_(AxisType::Category).data(labels))
        .y_axis(
            Axis::new()
                .type_(AxisType::Value)
                .axis_label(AxisLabel::new().formatter(currency_formatter())),
        )
        .series(bar::Bar::new().name("Total").data(values))
}

#[inline]
fn currency_formatter() -> JsFunction {
    JsFunction::new_with_args(
        "number",
        "const currencyFormatter = new Intl.NumberFormat('pt-BR', {
              style: 'currency',
              currency: 'BRL'
            });
            return (number) ? currencyFormatter.format(number) : \"-\";",
    )
}

/// Creates a tooltip configuration for currency values
fn currency_tooltip() -> Tooltip {
    Tooltip::new()
        .trigger(Trigger::Axis)
        .value_formatter(currency_formatter())
        .axis_pointer(AxisPointer::new().type_(AxisPointerType::Shadow))
}

#[cfg(test)]
mod tests {
    use maud::PreEscaped;

    use crate::{html::HeadElement, money::Money};

    use super::{DashboardChart, charts_script, top_members_chart};

    #[test]
    fn chart_lists_members_in_order() {
        let top = vec![
            ("Maria".to_owned(), Money::from_cents(15050)),
            ("João".to_owned(), Money::from_reais(20)),
        ];

        let options = top_members_chart(&top, "março de 2024").to_string();

        let maria = options.find("Maria").expect("Maria missing");
        let joao = options.find("João").expect("João missing");
        assert!(maria < joao);
        assert!(options.contains("150.5"));
        assert!(options.contains("BRL"));
    }

    #[test]
    fn script_initialises_each_chart() {
        let charts = [DashboardChart {
            id: "top-members-chart",
            options: "{}".to_owned(),
        }];

        let HeadElement::ScriptSource(PreEscaped(script)) = charts_script(&charts) else {
            panic!("expected inline script");
        };

        assert!(script.contains("document.getElementById(\"top-members-chart\")"));
    }
}
