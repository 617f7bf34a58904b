//! Integration tests for SQLite storage layer
//!
//! Tests database operations using in-memory and file-backed SQLite databases.

use opening_blunders::config::DatabaseConfig;
use opening_blunders::storage::{GameQuery, NewGame, SqliteStorage, Storage};

/// Create an in-memory storage instance for testing
async fn create_test_storage() -> SqliteStorage {
    SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage")
}

async fn seed(storage: &SqliteStorage) {
    let games = [
        NewGame::new("e4 e5 Nf3 Nc6 Bb5", "Ruy Lopez", 1500.0).with_time_control("600+0"),
        NewGame::new("e4 c5 Nf3 d6", "Sicilian Defense", 1650.0),
        NewGame::new("d4 d5 c4", "Queen's Gambit", 1400.0),
        NewGame::new("e4 e5 Bc4", "Bishop's Opening", 1700.0),
        NewGame::new("e4 e5 Nf3 Nf6", "Petrov's Defense", 2100.0),
    ];
    for game in &games {
        storage.insert_game(game).await.unwrap();
    }
}

#[cfg(test)]
mod game_tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_count() {
        let storage = create_test_storage().await;
        assert_eq!(storage.count_games().await.unwrap(), 0);

        let id = storage
            .insert_game(&NewGame::new("e4", "King's Pawn", 1500.0))
            .await
            .unwrap();
        assert!(id > 0);
        assert_eq!(storage.count_games().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fetch_filters_by_elo_inclusive() {
        let storage = create_test_storage().await;
        seed(&storage).await;

        let games = storage
            .fetch_games(&GameQuery::around(1500.0, 200.0))
            .await
            .unwrap();

        let openings: Vec<&str> = games.iter().map(|g| g.opening.as_str()).collect();
        assert_eq!(
            openings,
            vec!["Queen's Gambit", "Sicilian Defense", "Bishop's Opening", "Ruy Lopez"]
        );
    }

    #[tokio::test]
    async fn test_fetch_orders_by_moves() {
        let storage = create_test_storage().await;
        seed(&storage).await;

        let games = storage
            .fetch_games(&GameQuery::around(1750.0, 1000.0))
            .await
            .unwrap();
        let moves: Vec<&str> = games.iter().map(|g| g.moves.as_str()).collect();

        let mut sorted = moves.clone();
        sorted.sort_unstable();
        assert_eq!(moves, sorted);
        assert_eq!(games.len(), 5);
    }

    #[tokio::test]
    async fn test_fetch_by_starting_moves() {
        let storage = create_test_storage().await;
        seed(&storage).await;

        let query = GameQuery::around(1750.0, 1000.0).with_starting_moves("e4 e5 Nf3");
        let games = storage.fetch_games(&query).await.unwrap();

        let openings: Vec<&str> = games.iter().map(|g| g.opening.as_str()).collect();
        assert_eq!(openings, vec!["Ruy Lopez", "Petrov's Defense"]);
    }

    #[tokio::test]
    async fn test_fetch_none_prefix_matches_everything() {
        let storage = create_test_storage().await;
        seed(&storage).await;

        let query = GameQuery::around(1750.0, 1000.0).with_starting_moves("none");
        assert_eq!(storage.fetch_games(&query).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_fetch_truncates_moves() {
        let storage = create_test_storage().await;
        seed(&storage).await;

        let query = GameQuery::around(1500.0, 0.0).with_max_plies(2);
        let games = storage.fetch_games(&query).await.unwrap();

        assert_eq!(games.len(), 1);
        assert_eq!(games[0].moves, "e4 e5");
        assert_eq!(games[0].time_control.as_deref(), Some("600+0"));
    }
}

#[cfg(test)]
mod evaluation_tests {
    use super::*;

    #[tokio::test]
    async fn test_evaluations_round_trip() {
        let storage = create_test_storage().await;
        assert!(storage.load_evaluations().await.unwrap().is_empty());

        storage.insert_evaluation("fen-a", 0.35).await.unwrap();
        storage.insert_evaluation("fen-b", -5.0).await.unwrap();

        let stored = storage.load_evaluations().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored["fen-a"], 0.35);
        assert_eq!(stored["fen-b"], -5.0);
    }

    #[tokio::test]
    async fn test_insert_evaluation_is_idempotent() {
        let storage = create_test_storage().await;

        storage.insert_evaluation("fen-a", 0.35).await.unwrap();
        storage.insert_evaluation("fen-a", 0.35).await.unwrap();
        storage.insert_evaluation("fen-a", 0.4).await.unwrap();

        let stored = storage.load_evaluations().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored["fen-a"], 0.4);
    }

    #[tokio::test]
    async fn test_file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("nested").join("openings.db"),
            max_connections: 2,
        };

        {
            let storage = SqliteStorage::new(&config).await.unwrap();
            storage.insert_evaluation("fen-a", 1.25).await.unwrap();
            storage
                .insert_game(&NewGame::new("e4", "King's Pawn", 1500.0))
                .await
                .unwrap();
            storage.pool().close().await;
        }

        let reopened = SqliteStorage::new(&config).await.unwrap();
        assert_eq!(reopened.load_evaluations().await.unwrap()["fen-a"], 1.25);
        assert_eq!(reopened.count_games().await.unwrap(), 1);
    }
}
