use board::Color;
use room::{MessageType, Payload, PeerId};
use serde::{Deserialize, Serialize};

/// Who plays which color; only the host ever changes it
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatConfiguration {
    pub white: Option<PeerId>,
    pub black: Option<PeerId>,
    pub spectators: usize,
}

impl Payload for SeatConfiguration {
    const KIND: MessageType = MessageType::Configuration;
}

impl SeatConfiguration {
    pub fn holder(&self, color: Color) -> Option<PeerId> {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    pub fn seat_of(&self, peer: PeerId) -> Option<Color> {
        Color::BOTH
            .into_iter()
            .find(|color| self.holder(*color) == Some(peer))
    }

    /// Seat a newcomer: white if free, else black if free, else the stands
    pub fn assign(&mut self, peer: PeerId) -> Option<Color> {
        if let Some(color) = self.seat_of(peer) {
            return Some(color);
        }
        let seat = if self.white.is_none() {
            self.white = Some(peer);
            Some(Color::White)
        } else if self.black.is_none() {
            self.black = Some(peer);
            Some(Color::Black)
        } else {
            self.spectators += 1;
            None
        };
        log::info!("seated {peer} as {}", describe(seat));
        seat
    }

    /// Someone left: a color seat stays empty, anyone else was a spectator
    pub fn vacate(&mut self, peer: PeerId) -> Option<Color> {
        let seat = self.seat_of(peer);
        match seat {
            Some(Color::White) => self.white = None,
            Some(Color::Black) => self.black = None,
            None => self.spectators = self.spectators.saturating_sub(1),
        }
        log::info!("{peer} left their place as {}", describe(seat));
        seat
    }
}

fn describe(seat: Option<Color>) -> String {
    match seat {
        Some(color) => color.to_string(),
        None => "spectator".to_owned(),
    }
}
