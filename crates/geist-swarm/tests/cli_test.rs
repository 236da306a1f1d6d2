use std::path::PathBuf;

use clap::Parser;
use geist_swarm::cli::{Cli, Command};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("geist").chain(args.iter().copied())).unwrap()
}

#[test]
fn test_create_takes_name_and_persona() {
    let cli = parse(&["create", "socrates", "personas/socrates.txt"]);
    assert_eq!(
        cli.command,
        Command::Create {
            name: "socrates".into(),
            persona: PathBuf::from("personas/socrates.txt"),
        }
    );
    assert!(!cli.dry_run);
}

#[test]
fn test_ask_geist_list_is_comma_separated() {
    let cli = parse(&["ask", "What is virtue?", "--geist", "socrates,@plato"]);
    assert_eq!(
        cli.command,
        Command::Ask {
            question: "What is virtue?".into(),
            geists: vec!["socrates".into(), "@plato".into()],
        }
    );
}

#[test]
fn test_round_defaults() {
    match parse(&["converse", "Love"]).command {
        Command::Converse { rounds, geists, .. } => {
            assert_eq!(rounds, 2);
            assert!(geists.is_empty());
        }
        other => panic!("unexpected {other:?}"),
    }
    match parse(&["debate", "Free will", "--for", "kant", "--against", "hume"]).command {
        Command::Debate {
            affirmative,
            negative,
            rounds,
            ..
        } => {
            assert_eq!((affirmative.as_str(), negative.as_str(), rounds), ("kant", "hume", 3));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_debate_requires_both_sides() {
    let result = Cli::try_parse_from(["geist", "debate", "Free will", "--for", "kant"]);
    assert!(result.is_err());
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = parse(&["list", "--dry-run", "--state-dir", "/tmp/geist"]);
    assert!(cli.dry_run);
    assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/geist")));
    assert_eq!(cli.command, Command::List);
}

#[test]
fn test_only_list_and_ask_seed_personas() {
    assert!(Command::List.seeds_personas());
    assert!(parse(&["ask", "Why?"]).command.seeds_personas());
    assert!(!Command::History.seeds_personas());
    assert!(!Command::Reset.seeds_personas());
}
