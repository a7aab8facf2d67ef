use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;
use tracing::{trace, warn};

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent};
use crate::domain::{BrowserConfig, BrowserError, Message};
use crate::model::{Modus, Model};

pub struct Controller {
    event_poll_time: u64,
    inbox: Receiver<Message>,
}

impl Controller {
    pub fn new(cfg: &BrowserConfig, inbox: Receiver<Message>) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
            inbox,
        }
    }

    /// Worker results first, then one terminal event. `None` lets the model tick.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, BrowserError> {
        match self.inbox.try_recv() {
            Ok(message) => return Ok(Some(message)),
            Err(TryRecvError::Disconnected) => warn!("Worker channel closed"),
            Err(TryRecvError::Empty) => {}
        }

        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            if model.raw_keyevents() {
                return Ok(Some(Message::RawKey(key)));
            }
            return Ok(map_key(model.modus(), key));
        }
        Ok(None)
    }
}

fn map_key(modus: Modus, key: KeyEvent) -> Option<Message> {
    let message = match modus {
        Modus::TABLE => match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Char('/') => Some(Message::Search),
            KeyCode::Char('f') => Some(Message::Filters),
            KeyCode::Char('c') => Some(Message::Columns),
            KeyCode::Char('e') => Some(Message::Export),
            KeyCode::Esc => Some(Message::Exit),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
            KeyCode::Right | KeyCode::PageDown => Some(Message::NextPage),
            KeyCode::Left | KeyCode::PageUp => Some(Message::PreviousPage),
            KeyCode::Home => Some(Message::FirstPage),
            KeyCode::End => Some(Message::LastPage),
            _ => None,
        },
        Modus::FILTERS => match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Char('f') => Some(Message::Filters),
            KeyCode::Char('e') => Some(Message::Export),
            KeyCode::Tab | KeyCode::Down => Some(Message::NextItem),
            KeyCode::BackTab | KeyCode::Up => Some(Message::PreviousItem),
            KeyCode::Right => Some(Message::NextOption),
            KeyCode::Left => Some(Message::PreviousOption),
            KeyCode::Backspace | KeyCode::Delete => Some(Message::ClearItem),
            KeyCode::Esc => Some(Message::Exit),
            KeyCode::Enter => Some(Message::Enter),
            _ => None,
        },
        Modus::COLUMNS => match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Char('c') => Some(Message::Columns),
            KeyCode::Char(' ') => Some(Message::Toggle),
            KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
            KeyCode::Esc => Some(Message::Exit),
            KeyCode::Enter => Some(Message::Enter),
            _ => None,
        },
        Modus::POPUP => match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Esc => Some(Message::Exit),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Char('?') => Some(Message::Help),
            _ => None,
        },
        Modus::CMDINPUT => Some(Message::RawKey(key)),
    };
    trace!("Mapped: {key:?} => {message:?}");
    message
}
