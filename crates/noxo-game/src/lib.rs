//! The 3×3 game engine: board, move legality, win/draw detection, and
//! the turn machine.
//!
//! The engine knows nothing about rooms, clients, or the wire — it deals
//! purely in [`Slot`]s (the two player positions) and board coordinates.
//! A round is started with [`Game::reset`], moves are applied with
//! [`Game::play`], and a terminal result freezes the board until the
//! next reset.

use std::fmt;

/// Board edge length. The board is always `SIZE` × `SIZE`.
pub const SIZE: usize = 3;

// ---------------------------------------------------------------------------
// Slots and cells
// ---------------------------------------------------------------------------

/// One of the two player positions inside a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    P1,
    P2,
}

impl Slot {
    /// The opposite slot.
    pub fn other(self) -> Slot {
        match self {
            Slot::P1 => Slot::P2,
            Slot::P2 => Slot::P1,
        }
    }

    /// Index into a two-element slot array.
    pub fn index(self) -> usize {
        match self {
            Slot::P1 => 0,
            Slot::P2 => 1,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::P1 => write!(f, "p1"),
            Slot::P2 => write!(f, "p2"),
        }
    }
}

/// One board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    X,
    O,
}

impl Cell {
    /// The wire character for this cell's mark. Empty cells never appear
    /// on the wire.
    pub fn as_char(self) -> char {
        match self {
            Cell::Empty => ' ',
            Cell::X => 'X',
            Cell::O => 'O',
        }
    }
}

// ---------------------------------------------------------------------------
// Status and errors
// ---------------------------------------------------------------------------

/// The lifecycle state of one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Moves are being accepted.
    Running,
    /// The last mover completed a line. Board frozen until reset.
    Won,
    /// The board filled without a line. Board frozen until reset.
    Draw,
}

/// Why a move was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    /// The round already ended; a reset is required first.
    #[error("game finished")]
    GameFinished,

    /// The mover is not the player on move (or no one is on move).
    #[error("not your turn")]
    NotYourTurn,

    /// A coordinate lies outside 0..=2.
    #[error("coordinates out of range")]
    OutOfRange,

    /// The target cell already holds a mark.
    #[error("cell occupied")]
    Occupied,
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// One round of play on a 3×3 board.
///
/// X belongs to the round's starting player: `reset(first)` assigns X to
/// `first` and puts it on move, so X always moves first. While Running,
/// the X count minus the O count is 0 or 1; a terminal status leaves
/// `current_turn` untouched and the board immutable.
#[derive(Debug, Clone)]
pub struct Game {
    board: [[Cell; SIZE]; SIZE],
    current_turn: Option<Slot>,
    x_slot: Slot,
    status: Status,
}

impl Game {
    /// An idle game: empty board, no one on move. The first
    /// [`reset`](Self::reset) starts actual play.
    pub fn new() -> Self {
        Self {
            board: [[Cell::Empty; SIZE]; SIZE],
            current_turn: None,
            x_slot: Slot::P1,
            status: Status::Running,
        }
    }

    /// Starts a fresh round: clears the board, hands X to `first`, and
    /// puts `first` on move.
    pub fn reset(&mut self, first: Slot) {
        self.board = [[Cell::Empty; SIZE]; SIZE];
        self.current_turn = Some(first);
        self.x_slot = first;
        self.status = Status::Running;
    }

    /// Applies a move by `who` at column `x`, row `y`.
    ///
    /// On success the resulting [`Status`] is returned; a non-terminal
    /// move passes the turn to the other slot, a terminal one freezes
    /// the round.
    ///
    /// # Errors
    /// Checked in order: [`MoveError::GameFinished`],
    /// [`MoveError::NotYourTurn`], [`MoveError::OutOfRange`],
    /// [`MoveError::Occupied`].
    pub fn play(&mut self, who: Slot, x: u8, y: u8) -> Result<Status, MoveError> {
        if self.status != Status::Running {
            return Err(MoveError::GameFinished);
        }
        if self.current_turn != Some(who) {
            return Err(MoveError::NotYourTurn);
        }
        let (x, y) = (x as usize, y as usize);
        if x >= SIZE || y >= SIZE {
            return Err(MoveError::OutOfRange);
        }
        if self.board[y][x] != Cell::Empty {
            return Err(MoveError::Occupied);
        }

        let mark = self.mark_of(who);
        self.board[y][x] = mark;

        if has_line(&self.board, mark) {
            self.status = Status::Won;
        } else if is_full(&self.board) {
            self.status = Status::Draw;
        } else {
            self.current_turn = Some(who.other());
        }
        Ok(self.status)
    }

    /// Current round status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// The slot on move, if anyone is.
    pub fn current_turn(&self) -> Option<Slot> {
        self.current_turn
    }

    /// Drops the turn if it currently references `slot`. Used when the
    /// player on move disappears; the turn must not point at a vacant
    /// slot.
    pub fn vacate_turn(&mut self, slot: Slot) {
        if self.current_turn == Some(slot) {
            self.current_turn = None;
        }
    }

    /// Hands a dropped turn back to `slot`. No-op unless the round is
    /// running with no one on move.
    pub fn restore_turn(&mut self, slot: Slot) {
        if self.status == Status::Running && self.current_turn.is_none() {
            self.current_turn = Some(slot);
        }
    }

    /// The mark `slot` plays this round.
    pub fn mark_of(&self, slot: Slot) -> Cell {
        if slot == self.x_slot {
            Cell::X
        } else {
            Cell::O
        }
    }

    /// The slot that owns `mark` this round. Meaningless for
    /// [`Cell::Empty`], which maps to the O side.
    pub fn slot_of_mark(&self, mark: Cell) -> Slot {
        if mark == Cell::X {
            self.x_slot
        } else {
            self.x_slot.other()
        }
    }

    /// The cell at column `x`, row `y`.
    pub fn cell(&self, x: usize, y: usize) -> Cell {
        self.board[y][x]
    }

    /// Iterates all cells as `(x, y, cell)`, rows outer, columns inner —
    /// the order in which a board is replayed to a reconnecting player.
    pub fn cells(&self) -> impl Iterator<Item = (u8, u8, Cell)> + '_ {
        (0..SIZE).flat_map(move |y| {
            (0..SIZE).map(move |x| (x as u8, y as u8, self.board[y][x]))
        })
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

fn has_line(b: &[[Cell; SIZE]; SIZE], m: Cell) -> bool {
    (0..SIZE).any(|y| (0..SIZE).all(|x| b[y][x] == m))      // rows
        || (0..SIZE).any(|x| (0..SIZE).all(|y| b[y][x] == m)) // columns
        || (0..SIZE).all(|i| b[i][i] == m)                    // diagonal
        || (0..SIZE).all(|i| b[i][SIZE - 1 - i] == m)         // anti-diagonal
}

fn is_full(b: &[[Cell; SIZE]; SIZE]) -> bool {
    b.iter().all(|row| row.iter().all(|c| *c != Cell::Empty))
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn running_game() -> Game {
        let mut game = Game::new();
        game.reset(Slot::P1);
        game
    }

    #[test]
    fn test_reset_puts_first_on_move_with_x() {
        let mut game = Game::new();
        game.reset(Slot::P2);
        assert_eq!(game.current_turn(), Some(Slot::P2));
        assert_eq!(game.mark_of(Slot::P2), Cell::X);
        assert_eq!(game.mark_of(Slot::P1), Cell::O);
        assert_eq!(game.status(), Status::Running);
    }

    #[test]
    fn test_play_places_mark_and_toggles_turn() {
        let mut game = running_game();
        let status = game.play(Slot::P1, 0, 0).expect("legal move");
        assert_eq!(status, Status::Running);
        assert_eq!(game.cell(0, 0), Cell::X);
        assert_eq!(game.current_turn(), Some(Slot::P2));
    }

    #[test]
    fn test_play_out_of_turn_rejected() {
        let mut game = running_game();
        assert_eq!(game.play(Slot::P2, 0, 0), Err(MoveError::NotYourTurn));
    }

    #[test]
    fn test_play_without_anyone_on_move_rejected() {
        // A fresh game has no one on move until the first reset.
        let mut game = Game::new();
        assert_eq!(game.play(Slot::P1, 0, 0), Err(MoveError::NotYourTurn));
    }

    #[test]
    fn test_play_out_of_range_rejected() {
        let mut game = running_game();
        assert_eq!(game.play(Slot::P1, 3, 0), Err(MoveError::OutOfRange));
        assert_eq!(game.play(Slot::P1, 0, 3), Err(MoveError::OutOfRange));
    }

    #[test]
    fn test_play_occupied_cell_rejected() {
        let mut game = running_game();
        game.play(Slot::P1, 1, 1).unwrap();
        assert_eq!(game.play(Slot::P2, 1, 1), Err(MoveError::Occupied));
    }

    #[test]
    fn test_win_detection_all_lines() {
        // Rows
        for y in 0..3u8 {
            let mut game = running_game();
            // P1 fills row y, P2 plays elsewhere without interfering.
            let other_y = (y + 1) % 3;
            game.play(Slot::P1, 0, y).unwrap();
            game.play(Slot::P2, 0, other_y).unwrap();
            game.play(Slot::P1, 1, y).unwrap();
            game.play(Slot::P2, 1, other_y).unwrap();
            assert_eq!(game.play(Slot::P1, 2, y), Ok(Status::Won), "row {y}");
        }
        // Columns
        for x in 0..3u8 {
            let mut game = running_game();
            let other_x = (x + 1) % 3;
            game.play(Slot::P1, x, 0).unwrap();
            game.play(Slot::P2, other_x, 0).unwrap();
            game.play(Slot::P1, x, 1).unwrap();
            game.play(Slot::P2, other_x, 1).unwrap();
            assert_eq!(game.play(Slot::P1, x, 2), Ok(Status::Won), "col {x}");
        }
    }

    #[test]
    fn test_win_detection_diagonals() {
        let mut game = running_game();
        game.play(Slot::P1, 0, 0).unwrap();
        game.play(Slot::P2, 1, 0).unwrap();
        game.play(Slot::P1, 1, 1).unwrap();
        game.play(Slot::P2, 2, 0).unwrap();
        assert_eq!(game.play(Slot::P1, 2, 2), Ok(Status::Won));

        let mut game = running_game();
        game.play(Slot::P1, 2, 0).unwrap();
        game.play(Slot::P2, 0, 0).unwrap();
        game.play(Slot::P1, 1, 1).unwrap();
        game.play(Slot::P2, 1, 0).unwrap();
        assert_eq!(game.play(Slot::P1, 0, 2), Ok(Status::Won));
    }

    #[test]
    fn test_draw_on_full_board() {
        //  X | O | X
        //  X | O | O
        //  O | X | X
        let mut game = running_game();
        game.play(Slot::P1, 0, 0).unwrap(); // X
        game.play(Slot::P2, 1, 0).unwrap(); // O
        game.play(Slot::P1, 2, 0).unwrap(); // X
        game.play(Slot::P2, 1, 1).unwrap(); // O
        game.play(Slot::P1, 0, 1).unwrap(); // X
        game.play(Slot::P2, 2, 1).unwrap(); // O
        game.play(Slot::P1, 1, 2).unwrap(); // X
        game.play(Slot::P2, 0, 2).unwrap(); // O
        assert_eq!(game.play(Slot::P1, 2, 2), Ok(Status::Draw));
    }

    #[test]
    fn test_terminal_status_freezes_board() {
        let mut game = running_game();
        game.play(Slot::P1, 0, 0).unwrap();
        game.play(Slot::P2, 0, 1).unwrap();
        game.play(Slot::P1, 1, 0).unwrap();
        game.play(Slot::P2, 1, 1).unwrap();
        assert_eq!(game.play(Slot::P1, 2, 0), Ok(Status::Won));

        // The winner stays recorded as the mover on turn; no further
        // moves are accepted from anyone.
        assert_eq!(game.play(Slot::P2, 2, 2), Err(MoveError::GameFinished));
        assert_eq!(game.play(Slot::P1, 2, 2), Err(MoveError::GameFinished));
    }

    #[test]
    fn test_reset_after_terminal_allows_play_again() {
        let mut game = running_game();
        game.play(Slot::P1, 0, 0).unwrap();
        game.play(Slot::P2, 0, 1).unwrap();
        game.play(Slot::P1, 1, 0).unwrap();
        game.play(Slot::P2, 1, 1).unwrap();
        game.play(Slot::P1, 2, 0).unwrap();

        game.reset(Slot::P2);
        assert_eq!(game.status(), Status::Running);
        assert_eq!(game.cell(0, 0), Cell::Empty);
        assert_eq!(game.play(Slot::P2, 0, 0), Ok(Status::Running));
        assert_eq!(game.cell(0, 0), Cell::X);
    }

    #[test]
    fn test_vacate_and_restore_turn() {
        let mut game = running_game();
        game.vacate_turn(Slot::P2); // not on move, no effect
        assert_eq!(game.current_turn(), Some(Slot::P1));

        game.vacate_turn(Slot::P1);
        assert_eq!(game.current_turn(), None);
        assert_eq!(game.play(Slot::P1, 0, 0), Err(MoveError::NotYourTurn));

        game.restore_turn(Slot::P1);
        assert_eq!(game.current_turn(), Some(Slot::P1));
        assert!(game.play(Slot::P1, 0, 0).is_ok());
    }

    #[test]
    fn test_restore_turn_ignored_when_someone_on_move() {
        let mut game = running_game();
        game.restore_turn(Slot::P2);
        assert_eq!(game.current_turn(), Some(Slot::P1));
    }

    #[test]
    fn test_cells_iterates_rows_then_columns() {
        let mut game = running_game();
        game.play(Slot::P1, 2, 0).unwrap();
        game.play(Slot::P2, 0, 1).unwrap();

        let marked: Vec<(u8, u8, Cell)> =
            game.cells().filter(|(_, _, c)| *c != Cell::Empty).collect();
        // Row 0 first, then row 1.
        assert_eq!(marked, vec![(2, 0, Cell::X), (0, 1, Cell::O)]);
    }

    #[test]
    fn test_slot_of_mark_follows_starting_player() {
        let mut game = Game::new();
        game.reset(Slot::P2);
        assert_eq!(game.slot_of_mark(Cell::X), Slot::P2);
        assert_eq!(game.slot_of_mark(Cell::O), Slot::P1);
    }
}
