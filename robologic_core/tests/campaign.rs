use std::{sync::Arc, time::Duration};

use robologic_core::{
    Command, Position,
    engine::{EngineEvent, Status},
    level::LevelData,
    session::{LevelOrigin, LevelSession, SessionConfig},
    solver,
    source::{HintSource, LevelSource, OfflineSource, SourceError},
};

/// Always hands out the same generated layout.
struct FixedGenerator;

impl LevelSource for FixedGenerator {
    fn generate_level(&self, difficulty: &str, level_number: u32) -> Result<LevelData, SourceError> {
        Ok(LevelData {
            id: 999,
            grid_size: 5,
            layout: ["S.C..", "XXXX.", "....G", ".....", "....."]
                .iter()
                .map(|r| r.to_string())
                .collect(),
            story: format!("Level {level_number}"),
            difficulty: difficulty.to_string(),
            par: 6,
        })
    }
}

impl HintSource for FixedGenerator {
    fn hint(&self, layout: &[String], commands: &[String]) -> Result<String, SourceError> {
        Ok(format!("{} rows, {} commands", layout.len(), commands.len()))
    }
}

/// Drives a session the way a front end does: a clock that advances in
/// small steps and an update call on every step.
struct Driver {
    session: LevelSession,
    now: Duration,
}

impl Driver {
    fn new(levels: Arc<dyn LevelSource>, hints: Arc<dyn HintSource>) -> Self {
        Driver {
            session: LevelSession::new(SessionConfig::default(), levels, hints).unwrap(),
            now: Duration::ZERO,
        }
    }

    fn advance_clock(&mut self, millis: u64) -> Vec<EngineEvent> {
        let target = self.now + Duration::from_millis(millis);
        let mut events = Vec::new();
        while self.now < target {
            self.now += Duration::from_millis(10);
            events.extend(self.session.update(self.now));
        }
        events
    }

    fn solve_and_run(&mut self) -> Vec<EngineEvent> {
        let solution = solver::solve(self.session.grid()).expect("level is solvable");
        for command in solution {
            self.session.add_command(command).unwrap();
        }
        self.session.run(self.now).unwrap();
        let mut events = Vec::new();
        while self.session.state().is_running() {
            events.extend(self.advance_clock(100));
        }
        events
    }
}

#[test]
fn offline_campaign_cycles_fallback_levels_and_banks_score() {
    let mut driver = Driver::new(Arc::new(OfflineSource), Arc::new(OfflineSource));
    let mut banked = 0;

    for expected_id in 1..=3 {
        assert_eq!(driver.session.level().id, expected_id);
        driver.solve_and_run();
        assert_eq!(driver.session.state().status, Status::Won);
        banked += driver.session.state().score;

        assert_eq!(driver.session.advance_level(), Ok(LevelOrigin::Fallback));
        assert_eq!(driver.session.banked_score(), banked);
    }

    // Level 4 cycles back to the second table entry.
    assert_eq!(driver.session.level().id, 4);
    assert_eq!(driver.session.level().par, 10);
}

#[test]
fn generated_levels_are_renumbered_and_played() {
    let generator = Arc::new(FixedGenerator);
    let mut driver = Driver::new(generator.clone(), generator);
    driver.solve_and_run();

    assert_eq!(driver.session.advance_level(), Ok(LevelOrigin::Generated));
    assert_eq!(driver.session.level().id, 2);
    assert_eq!(driver.session.level().story, "Level 2");
    assert_eq!(driver.session.state().total_coins, 1);

    let events = driver.solve_and_run();
    assert_eq!(driver.session.state().status, Status::Won);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, EngineEvent::Won { at, .. } if *at == Position::new(4, 2)))
    );
    assert_eq!(driver.session.request_hint(), "5 rows, 6 commands");
}

#[test]
fn pending_tick_never_lands_after_a_reset() {
    let mut driver = Driver::new(Arc::new(OfflineSource), Arc::new(OfflineSource));
    for command in [Command::Right, Command::Right, Command::Right] {
        driver.session.add_command(command).unwrap();
    }
    driver.session.run(driver.now).unwrap();

    let events = driver.advance_clock(150);
    assert_eq!(events.len(), 1);
    assert_eq!(driver.session.state().position, Position::new(1, 0));

    driver.session.reset();
    assert!(driver.session.program().is_empty());
    let events = driver.advance_clock(5_000);
    assert!(events.is_empty());
    assert_eq!(driver.session.state().status, Status::Idle);
    assert_eq!(driver.session.state().position, Position::new(0, 0));
}

#[test]
fn crash_leaves_the_robot_where_it_was() {
    let mut driver = Driver::new(Arc::new(OfflineSource), Arc::new(OfflineSource));
    for command in [Command::Down, Command::Down, Command::Down, Command::Right] {
        driver.session.add_command(command).unwrap();
    }
    driver.session.run(driver.now).unwrap();
    while driver.session.state().is_running() {
        driver.advance_clock(100);
    }

    let state = driver.session.state();
    assert_eq!(state.status, Status::Lost);
    assert_eq!(state.executing_index, Some(3));
    assert_eq!(state.position, Position::new(0, 3));
}
