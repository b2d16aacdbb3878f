//! Rendering for the dashboard pages.

use super::{App, IndicatorChart, Page, company_name, trend_arrow, trend_label};
use crate::types::MergedRow;
use ratatui::{
    prelude::*,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Tabs},
};

struct ChartSeries {
    label: String,
    color: Color,
    points: Vec<(f64, f64)>,
}

pub fn draw(f: &mut Frame, app: &App) {
    let main_layout =
        Layout::horizontal([Constraint::Percentage(22), Constraint::Percentage(78)]).split(f.size());
    draw_sidebar(f, app, main_layout[0]);

    let right = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .split(main_layout[1]);
    draw_tabs(f, app, right[0]);
    match app.page {
        Page::Indicators => draw_indicators_page(f, app, right[1]),
        Page::Forecasts => draw_forecasts_page(f, app, right[1]),
        Page::Summary => draw_summary_page(f, app, right[1]),
    }
    draw_status(f, app, right[2]);
}

fn draw_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Stocks")
        .title_alignment(Alignment::Center);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Length(4),
    ])
    .split(inner);

    let ticker_lines: Vec<Line> = app
        .tickers
        .iter()
        .enumerate()
        .map(|(i, ticker)| {
            let mut line = Line::from(format!("{} ({})", company_name(ticker), ticker));
            if i == app.selected_ticker {
                line = line.style(Style::default().fg(Color::Yellow).bg(Color::DarkGray));
            }
            line
        })
        .collect();
    f.render_widget(Paragraph::new(ticker_lines), chunks[0]);

    f.render_widget(
        Paragraph::new(format!("Horizon: {} days", app.horizon()))
            .style(Style::default().fg(Color::Cyan)),
        chunks[1],
    );
    f.render_widget(
        Paragraph::new("↑/↓ stock  h horizon\n←/→ chart  Tab page\ne export  q quit")
            .style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = Page::ALL.iter().map(|p| Line::from(p.title())).collect();
    let selected = Page::ALL.iter().position(|&p| p == app.page).unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(Style::default().fg(Color::Yellow).bold())
        .block(Block::default().borders(Borders::ALL).title(format!(
            "{} ({})",
            app.ticker().map(company_name).unwrap_or("no data"),
            app.ticker().unwrap_or("-")
        )));
    f.render_widget(tabs, area);
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let text = app
        .status
        .clone()
        .unwrap_or_else(|| "press e on the Forecasting page to export the table".to_string());
    f.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

fn draw_indicators_page(f: &mut Frame, app: &App, area: Rect) {
    let rows = app.ticker_rows();
    if rows.is_empty() {
        draw_warning(f, area, "No indicator data. Run the pipeline first.");
        return;
    }

    let close: Vec<(f64, f64)> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| (i as f64, r.close))
        .collect();
    let optional = |pick: fn(&crate::types::IndicatorRow) -> Option<f64>| -> Vec<(f64, f64)> {
        rows.iter()
            .enumerate()
            .filter_map(|(i, r)| pick(r).map(|v| (i as f64, v)))
            .collect()
    };

    let series: Vec<ChartSeries> = match app.chart {
        IndicatorChart::PriceMa => vec![
            ChartSeries {
                label: "Close".into(),
                color: Color::White,
                points: close,
            },
            ChartSeries {
                label: "SMA 20".into(),
                color: Color::Yellow,
                points: optional(|r| r.sma_20),
            },
            ChartSeries {
                label: "SMA 50".into(),
                color: Color::Green,
                points: optional(|r| r.sma_50),
            },
            ChartSeries {
                label: "EMA 20".into(),
                color: Color::Red,
                points: rows
                    .iter()
                    .enumerate()
                    .map(|(i, r)| (i as f64, r.ema_20))
                    .collect(),
            },
        ],
        IndicatorChart::Rsi => {
            let n = rows.len() as f64;
            vec![
                ChartSeries {
                    label: "RSI 14".into(),
                    color: Color::Magenta,
                    points: optional(|r| r.rsi_14),
                },
                ChartSeries {
                    label: "Overbought (70)".into(),
                    color: Color::Red,
                    points: vec![(0.0, 70.0), (n - 1.0, 70.0)],
                },
                ChartSeries {
                    label: "Oversold (30)".into(),
                    color: Color::Green,
                    points: vec![(0.0, 30.0), (n - 1.0, 30.0)],
                },
            ]
        }
        IndicatorChart::Macd => vec![
            ChartSeries {
                label: "MACD".into(),
                color: Color::Cyan,
                points: rows
                    .iter()
                    .enumerate()
                    .map(|(i, r)| (i as f64, r.macd))
                    .collect(),
            },
            ChartSeries {
                label: "Signal".into(),
                color: Color::Red,
                points: rows
                    .iter()
                    .enumerate()
                    .map(|(i, r)| (i as f64, r.macd_signal))
                    .collect(),
            },
        ],
        IndicatorChart::Bollinger => vec![
            ChartSeries {
                label: "Close".into(),
                color: Color::White,
                points: close,
            },
            ChartSeries {
                label: "BB Middle".into(),
                color: Color::Yellow,
                points: optional(|r| r.bb_middle),
            },
            ChartSeries {
                label: "BB Upper".into(),
                color: Color::Green,
                points: optional(|r| r.bb_upper),
            },
            ChartSeries {
                label: "BB Lower".into(),
                color: Color::Red,
                points: optional(|r| r.bb_lower),
            },
        ],
        IndicatorChart::Volatility => vec![ChartSeries {
            label: "Volatility 20".into(),
            color: Color::LightRed,
            points: optional(|r| r.volatility_20),
        }],
    };

    let x_labels: Vec<String> = [0, rows.len() / 2, rows.len().saturating_sub(1)]
        .iter()
        .map(|&i| rows[i].date.to_string())
        .collect();
    render_line_chart(f, area, app.chart.title(), &series, x_labels);
}

fn draw_forecasts_page(f: &mut Frame, app: &App, area: Rect) {
    let Some(merged) = &app.merged else {
        draw_warning(
            f,
            area,
            "No model results available for this stock and horizon.",
        );
        return;
    };
    if merged.is_empty() {
        draw_warning(f, area, "Merged results file is empty.");
        return;
    }

    let chunks = Layout::vertical([Constraint::Min(0), Constraint::Length(5)]).split(area);

    let pick = |get: fn(&MergedRow) -> Option<f64>| -> Vec<(f64, f64)> {
        merged
            .iter()
            .enumerate()
            .filter_map(|(i, r)| get(r).map(|v| (i as f64, v)))
            .collect()
    };
    let series = vec![
        ChartSeries {
            label: "Actual".into(),
            color: Color::White,
            points: pick(|r| Some(r.actual)),
        },
        ChartSeries {
            label: "ARIMA".into(),
            color: Color::Red,
            points: pick(|r| Some(r.arima_forecast)),
        },
        ChartSeries {
            label: "Prophet".into(),
            color: Color::Green,
            points: pick(|r| Some(r.prophet_forecast)),
        },
        ChartSeries {
            label: "SARIMA".into(),
            color: Color::Magenta,
            points: pick(|r| r.sarima_forecast),
        },
    ];
    let x_labels: Vec<String> = [0, merged.len() / 2, merged.len() - 1]
        .iter()
        .map(|&i| merged[i].date.to_string())
        .collect();
    render_line_chart(
        f,
        chunks[0],
        "Actual vs. Model Forecasts",
        &series,
        x_labels,
    );

    f.render_widget(
        Paragraph::new(trend_lines(merged)).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Model Trend Signal (last vs previous forecast; ties read Down)"),
        ),
        chunks[1],
    );
}

fn draw_summary_page(f: &mut Frame, app: &App, area: Rect) {
    let Some(merged) = &app.merged else {
        draw_warning(
            f,
            area,
            "No model results available for this stock and horizon.",
        );
        return;
    };
    let Some(last) = merged.last() else {
        draw_warning(f, area, "Merged results file is empty.");
        return;
    };

    let mut lines = vec![
        Line::from(vec![
            Span::raw("Latest Actual: "),
            Span::styled(format!("{:.2}", last.actual), Style::default().fg(Color::Cyan).bold()),
        ]),
        Line::from(""),
        Line::from(Span::styled("Model Forecasts", Style::default().bold())),
        Line::from(vec![
            Span::raw("  ARIMA:   "),
            Span::styled(
                format!("{:.2}", last.arima_forecast),
                Style::default().fg(Color::Red),
            ),
        ]),
        Line::from(vec![
            Span::raw("  Prophet: "),
            Span::styled(
                format!("{:.2}", last.prophet_forecast),
                Style::default().fg(Color::Green),
            ),
        ]),
        Line::from(vec![
            Span::raw("  SARIMA:  "),
            Span::styled(
                last.sarima_forecast
                    .map(|v| format!("{v:.2}"))
                    .unwrap_or_else(|| "n/a".to_string()),
                Style::default().fg(Color::Magenta),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled("Latest Model Signals", Style::default().bold())),
    ];
    lines.extend(trend_lines(merged));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Use the trend arrows for direction, the EDA page for context, and \
         the Forecasting page to compare model accuracy.",
        Style::default().fg(Color::DarkGray),
    )));

    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(Page::Summary.title()),
        ),
        area,
    );
}

fn trend_lines(merged: &[MergedRow]) -> Vec<Line<'static>> {
    if merged.len() < 2 {
        return vec![Line::from("Not enough rows for a trend signal.")];
    }
    let last = &merged[merged.len() - 1];
    let previous = &merged[merged.len() - 2];

    let mut signals: Vec<(&str, f64, f64)> = vec![
        ("ARIMA", last.arima_forecast, previous.arima_forecast),
        ("Prophet", last.prophet_forecast, previous.prophet_forecast),
    ];
    if let (Some(l), Some(p)) = (last.sarima_forecast, previous.sarima_forecast) {
        signals.push(("SARIMA", l, p));
    }

    signals
        .into_iter()
        .map(|(model, l, p)| {
            let label = trend_label(l, p);
            let color = if label == "Up" { Color::Green } else { Color::Red };
            Line::from(vec![
                Span::raw(format!("  {model}: ")),
                Span::styled(
                    format!("{} ({label})", trend_arrow(l, p)),
                    Style::default().fg(color).bold(),
                ),
            ])
        })
        .collect()
}

fn draw_warning(f: &mut Frame, area: Rect, message: &str) {
    f.render_widget(
        Paragraph::new(message)
            .style(Style::default().fg(Color::Yellow))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn render_line_chart(
    f: &mut Frame,
    area: Rect,
    title: &str,
    series: &[ChartSeries],
    x_labels: Vec<String>,
) {
    let mut x_max = 1.0f64;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for s in series {
        for &(x, y) in &s.points {
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }
    if !y_min.is_finite() {
        draw_warning(f, area, "Nothing to chart.");
        return;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }
    let pad = 0.05 * (y_max - y_min);
    let (y_min, y_max) = (y_min - pad, y_max + pad);

    let datasets: Vec<Dataset> = series
        .iter()
        .map(|s| {
            Dataset::default()
                .name(s.label.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(s.color))
                .data(&s.points)
        })
        .collect();

    let y_labels: Vec<String> = (0..=4)
        .map(|i| format!("{:.1}", y_min + (y_max - y_min) * i as f64 / 4.0))
        .collect();

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, x_max])
                .labels(x_labels.into_iter().map(Span::from).collect()),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([y_min, y_max])
                .labels(y_labels.into_iter().map(Span::from).collect()),
        );
    f.render_widget(chart, area);
}
