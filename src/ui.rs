use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, List, ListItem, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::BrowserConfig;
use crate::model::{Model, UIData};
use crate::status::PermitStatus;

pub struct UI {
    max_column_width: usize,
}

impl UI {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            max_column_width: config.max_column_width,
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let data = model.get_uidata();

        let [header, search, filters, table, pages, status] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(if data.filter_curser.is_some() { 7 } else { 1 }),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.draw_header(data, frame, header);
        self.draw_search(data, frame, search);
        self.draw_filters(data, frame, filters);
        self.draw_table(data, frame, table);
        self.draw_pages(data, frame, pages);
        self.draw_status(data, frame, status);

        if data.column_curser.is_some() {
            self.draw_columns(data, frame);
        }
        if data.show_popup {
            self.draw_popup(data, frame);
        }
    }

    fn draw_header(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans = vec![
            format!(" {} ", data.name).bold(),
            format!(" {} records ", data.total_records).into(),
        ];
        if let Some(date) = &data.last_updated {
            spans.push(format!(" Last updated: {date} ").dark_gray());
        }
        if let Some(loading) = &data.loading {
            spans.push(format!(" {loading} ").yellow().bold());
        }
        frame.render_widget(Line::from(spans), area);
    }

    fn draw_search(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let (text, style) = if data.active_cmdinput {
            (data.cmdinput.input.as_str(), Style::new().fg(Color::White))
        } else {
            (data.search_term.as_str(), Style::new().fg(Color::Gray))
        };
        let prefix = " Search: ";
        let line = Line::from(vec![prefix.blue().bold(), Span::styled(text, style)]);
        frame.render_widget(line, area);

        if data.active_cmdinput {
            let x = area.x + (prefix.chars().count() + data.cmdinput.curser_pos) as u16;
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
        }
    }

    fn draw_filters(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        match data.filter_curser {
            None => {
                let mut spans: Vec<Span> = vec![" Filters: ".blue().bold()];
                for (label, value, _) in &data.filters {
                    spans.push(format!("{label}=").dark_gray());
                    spans.push(format!("{value}  ").into());
                }
                frame.render_widget(Line::from(spans), area);
            }
            Some(selected) => {
                let items: Vec<ListItem> = data
                    .filters
                    .iter()
                    .enumerate()
                    .map(|(idx, (label, value, count))| {
                        let line = Line::from(format!("{label:<16} ◀ {value} ▶  ({count} options)"));
                        if idx == selected {
                            ListItem::new(line.reversed())
                        } else {
                            ListItem::new(line)
                        }
                    })
                    .collect();
                let block = Block::bordered()
                    .title(Line::from(" Filters ".bold()))
                    .title_bottom(Line::from(" ←/→ option  Backspace clear  Esc close ").centered());
                frame.render_widget(List::new(items).block(block), area);
            }
        }
    }

    fn draw_table(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let block = Block::bordered()
            .title(Line::from(format!(" {} matching ", data.filtered_count)))
            .title_bottom(Line::from(format!(" {} ", data.export_hint)).right_aligned())
            .border_set(border::PLAIN);

        if data.rows.is_empty() {
            let text = match data.loading {
                Some(_) => "Loading ...",
                None => "No records",
            };
            let paragraph = Paragraph::new(text).centered().block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let rows: Vec<Row> = data
            .rows
            .iter()
            .enumerate()
            .map(|(ridx, row)| {
                let cells = row.iter().enumerate().map(|(cidx, value)| {
                    let text = truncate(value, self.max_column_width);
                    match (data.status_column, data.row_status.get(ridx)) {
                        (Some(s), Some(status)) if s == cidx => {
                            Cell::from(text).style(Style::new().fg(status_color(*status)))
                        }
                        _ => Cell::from(text),
                    }
                });
                Row::new(cells)
            })
            .collect();
        let widths = data.widths.iter().map(|w| Constraint::Length(*w as u16));
        let headers = data.headers.iter().map(|h| Cell::from(h.as_str()));

        let table = Table::new(rows, widths)
            .column_spacing(1)
            .header(Row::new(headers).bold().underlined())
            .row_highlight_style(Style::new().bg(Color::Blue))
            .block(block);
        let mut state = TableState::default().with_selected(Some(data.selected_row));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_pages(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans: Vec<Span> = vec![" ◀ ".into()];
        for page in data.page_window.clone() {
            if page == data.page {
                spans.push(format!(" {page} ").reversed().bold());
            } else {
                spans.push(format!(" {page} ").into());
            }
        }
        spans.push(" ▶ ".into());
        spans.push(format!(" page {} of {} ", data.page, data.total_pages).dark_gray());
        frame.render_widget(Line::from(spans).centered(), area);
    }

    fn draw_status(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let line = Line::from(vec![
            format!(" {} ", data.status_message).into(),
            " ? help  q quit ".dark_gray(),
        ]);
        frame.render_widget(line, area);
    }

    fn draw_columns(&self, data: &UIData, frame: &mut Frame) {
        let area = popup_area(frame.area(), 40, 80);
        let selected = data.column_curser.unwrap_or(0);
        let items: Vec<ListItem> = data
            .column_choices
            .iter()
            .enumerate()
            .map(|(idx, (label, shown))| {
                let mark = if *shown { "[x]" } else { "[ ]" };
                let line = Line::from(format!("{mark} {label}"));
                if idx == selected {
                    ListItem::new(line.reversed())
                } else {
                    ListItem::new(line)
                }
            })
            .collect();
        let block = Block::bordered()
            .title(Line::from(" Columns ".bold()).centered())
            .title_bottom(Line::from(" Space toggle  Esc close ").centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, area);
        frame.render_widget(List::new(items).block(block), area);
    }

    fn draw_popup(&self, data: &UIData, frame: &mut Frame) {
        let area = popup_area(frame.area(), 60, 70);
        let block = Block::bordered()
            .title(Line::from(format!(" {} ", data.popup_title).bold()).centered())
            .title_bottom(Line::from(" <Enter> close ").centered())
            .border_set(border::THICK);
        let paragraph = Paragraph::new(data.popup_message.as_str())
            .wrap(Wrap { trim: false })
            .block(block);
        frame.render_widget(Clear, area);
        frame.render_widget(paragraph, area);
    }
}

fn status_color(status: PermitStatus) -> Color {
    match status {
        PermitStatus::Valid => Color::Green,
        PermitStatus::Expired => Color::Red,
        PermitStatus::Revoked => Color::Yellow,
        PermitStatus::UnspecifiedDate | PermitStatus::InvalidFormat => Color::Gray,
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out: String = value.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}
