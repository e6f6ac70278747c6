/// kanban-cli: maintenance commands over a kanban-store file.
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use kanban_store::config::{default_config_path, load_config};
use kanban_store::{BoardStore, MigrationOutcome, StoreError, CURRENT_VERSION};
use serde_json::json;

const USAGE: &str = "usage: kanban-cli [--config PATH] <list | show <board-id> | dump | clear | migrate>";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    List,
    Show(String),
    Dump,
    Clear,
    Migrate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation {
    config_path: PathBuf,
    command: Command,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Invocation, String> {
    let mut config_path = None;
    let mut words = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                config_path = Some(PathBuf::from(path));
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            _ => words.push(arg),
        }
    }

    let command = match words.as_slice() {
        [cmd] if cmd == "list" => Command::List,
        [cmd, id] if cmd == "show" => Command::Show(id.clone()),
        [cmd] if cmd == "dump" => Command::Dump,
        [cmd] if cmd == "clear" => Command::Clear,
        [cmd] if cmd == "migrate" => Command::Migrate,
        _ => return Err(USAGE.to_string()),
    };
    Ok(Invocation {
        config_path: config_path.unwrap_or_else(default_config_path),
        command,
    })
}

async fn run(store: &BoardStore, command: &Command) -> Result<serde_json::Value, StoreError> {
    let output = match command {
        Command::List => {
            let boards: Vec<_> = store
                .get_boards()
                .into_iter()
                .map(|b| {
                    json!({
                        "id": b.id,
                        "title": b.title,
                        "columns": b.columns.len(),
                        "cards": b.columns.iter().map(|c| c.cards.len()).sum::<usize>(),
                        "updatedAt": b.updated_at,
                    })
                })
                .collect();
            json!(boards)
        }
        Command::Show(board_id) => match store.get_board(board_id) {
            Some(board) => serde_json::to_value(board).map_err(kanban_store::StorageError::from)?,
            None => {
                return Err(StoreError::NotFound {
                    kind: kanban_store::RecordKind::Board,
                    id: board_id.clone(),
                })
            }
        },
        Command::Dump => {
            let snapshot = store.snapshot()?;
            json!({
                "version": CURRENT_VERSION,
                "boards": snapshot.boards.values().collect::<Vec<_>>(),
                "columns": snapshot.columns.values().collect::<Vec<_>>(),
                "cards": snapshot.cards.values().collect::<Vec<_>>(),
            })
        }
        Command::Clear => {
            store.clear().await?;
            json!({ "cleared": true })
        }
        Command::Migrate => match store.migration() {
            MigrationOutcome::Fresh => json!({ "version": CURRENT_VERSION, "result": "initialized" }),
            MigrationOutcome::UpToDate => json!({ "version": CURRENT_VERSION, "result": "up-to-date" }),
            MigrationOutcome::Migrated { from, steps } => json!({
                "version": CURRENT_VERSION,
                "result": "migrated",
                "from": from,
                "steps": steps,
            }),
        },
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = logging::init() {
        logging::write_fallback_line(&format!("Failed to initialize logger: {}", e));
    }

    let invocation = match parse_args(std::env::args().skip(1)) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    let config = load_config(&invocation.config_path);
    let store = match BoardStore::open_file(&config).await {
        Ok(store) => store,
        Err(e) => {
            log::error!("[kanban.cli] Failed to open store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = run(&store, &invocation.command).await;
    store.close().await;

    match result {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("[kanban.cli] Failed to render output: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            log::error!("[kanban.cli] {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanban_store::{MemoryKv, StoreConfig};
    use std::sync::Arc;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        let inv = parse_args(args(&["show", "b1"])).unwrap();
        assert_eq!(inv.command, Command::Show("b1".to_string()));
        assert_eq!(inv.config_path, default_config_path());

        let inv = parse_args(args(&["--config", "/tmp/c.json", "dump"])).unwrap();
        assert_eq!(inv.command, Command::Dump);
        assert_eq!(inv.config_path, PathBuf::from("/tmp/c.json"));
    }

    #[test]
    fn test_parse_rejects_bad_usage() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["show"])).is_err());
        assert!(parse_args(args(&["list", "extra"])).is_err());
        assert!(parse_args(args(&["dump", "--config"])).is_err());
    }

    #[tokio::test]
    async fn test_run_list_and_show() {
        let store = BoardStore::open(Arc::new(MemoryKv::new()), &StoreConfig::default())
            .await
            .unwrap();
        let board = store.create_board("Errands", "").await.unwrap();
        store.create_column(&board.id, "Todo").await.unwrap();

        let listed = run(&store, &Command::List).await.unwrap();
        assert_eq!(listed[0]["title"], "Errands");
        assert_eq!(listed[0]["columns"], 1);

        let shown = run(&store, &Command::Show(board.id.clone())).await.unwrap();
        assert_eq!(shown["columns"][0]["title"], "Todo");

        let missing = run(&store, &Command::Show("nope".to_string())).await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_run_clear_then_dump() {
        let store = BoardStore::open(Arc::new(MemoryKv::new()), &StoreConfig::default())
            .await
            .unwrap();
        store.create_board("Errands", "").await.unwrap();

        run(&store, &Command::Clear).await.unwrap();
        let dump = run(&store, &Command::Dump).await.unwrap();
        assert_eq!(dump["boards"], json!([]));
        assert_eq!(dump["version"], CURRENT_VERSION);

        let migrate = run(&store, &Command::Migrate).await.unwrap();
        assert_eq!(migrate["result"], "initialized");
    }
}
