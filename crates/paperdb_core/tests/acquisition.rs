use chrono::NaiveDate;
use paperdb_core::{
    Author, DatePrecision, Entity, EntityId, HistoryLog, Identified, Institution,
    InstitutionCategory, Link, Paper, PaperAuthor, Release, Role, Session, StoreConfig,
    StoreError, Topic, Venue, VenueType,
};
use rusqlite::Connection;

#[test]
fn paper_graph_lands_as_one_row_per_entity() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = memory_session(dir.path());
    let paper = simple_paper("T");

    let paper_id = session.acquire_one(&paper.clone().into()).unwrap();

    assert_eq!(paper_id, paper.identifier());
    assert!(paper_id.is_transient());
    let conn = session.connection();
    assert_eq!(count(conn, "paper"), 1);
    assert_eq!(count(conn, "author"), 1);
    assert_eq!(count(conn, "venue"), 1);
    assert_eq!(count(conn, "release"), 1);
    assert_eq!(count(conn, "paper_author"), 1);
    assert_eq!(count(conn, "paper_release"), 1);

    let (author_id, position): (EntityId, u32) = conn
        .query_row(
            "SELECT author_id, author_position FROM paper_author WHERE paper_id = ?1;",
            [paper_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(author_id, paper.authors[0].author.identifier());
    assert_eq!(position, 0);

    let venue_id: EntityId = conn
        .query_row("SELECT venue_id FROM release;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(venue_id, paper.releases[0].venue.identifier());
}

#[test]
fn reacquiring_identical_paper_adds_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = memory_session(dir.path());
    let paper: Entity = simple_paper("T").into();

    let first = session.acquire_one(&paper).unwrap();
    let before = total_rows(session.connection());
    let second = session.acquire_one(&paper).unwrap();

    assert_eq!(first, second);
    assert_eq!(total_rows(session.connection()), before);
}

#[test]
fn acquisition_is_idempotent_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("papers.db");
    let config = StoreConfig::new(dir.path().join("history")).with_db_path(&db_path);
    let paper: Entity = rich_paper().into();

    let first_id = {
        let mut session = Session::open(config.clone()).unwrap();
        session.import(std::slice::from_ref(&paper)).unwrap()[0]
    };
    let snapshot = dump(&Connection::open(&db_path).unwrap());

    let second_id = {
        let mut session = Session::open(config).unwrap();
        session.import(std::slice::from_ref(&paper)).unwrap()[0]
    };

    assert_eq!(first_id, second_id);
    assert_eq!(dump(&Connection::open(&db_path).unwrap()), snapshot);
}

#[test]
fn identical_content_collides_and_is_transient() {
    let a = rich_paper();
    let b = rich_paper();
    assert_eq!(a.identifier(), b.identifier());
    assert!(a.identifier().is_transient());

    let mut c = rich_paper();
    c.authors[1].author.name = "Other".to_string();
    assert_ne!(a.identifier(), c.identifier());
}

#[test]
fn author_positions_follow_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = memory_session(dir.path());
    let mut paper = simple_paper("Ordered");
    paper.authors = ["Carol", "Alice", "Bob"]
        .into_iter()
        .map(|name| PaperAuthor {
            author: author(name),
            affiliations: Vec::new(),
        })
        .collect();

    let paper_id = session.acquire_one(&paper.into()).unwrap();

    let mut stmt = session
        .connection()
        .prepare(
            "SELECT a.name
             FROM paper_author pa
             JOIN author a ON a.author_id = pa.author_id
             WHERE pa.paper_id = ?1
             ORDER BY pa.author_position ASC;",
        )
        .unwrap();
    let names: Vec<String> = stmt
        .query_map([paper_id], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(names, vec!["Carol", "Alice", "Bob"]);
}

#[test]
fn nested_relations_are_written_as_edges() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = memory_session(dir.path());

    session.acquire_one(&rich_paper().into()).unwrap();

    let conn = session.connection();
    assert_eq!(count(conn, "institution"), 1);
    assert_eq!(count(conn, "paper_author_institution"), 1);
    assert_eq!(count(conn, "author_institution"), 1);
    assert_eq!(count(conn, "author_alias"), 1);
    assert_eq!(count(conn, "author_link"), 1);
    assert_eq!(count(conn, "paper_topic"), 2);
    assert_eq!(count(conn, "paper_link"), 1);
    assert_eq!(count(conn, "paper_scraper"), 1);
    assert_eq!(count(conn, "venue_link"), 1);

    let role_start: Option<String> = conn
        .query_row("SELECT start_date FROM author_institution;", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(role_start.as_deref(), Some("2019-09-01"));
}

#[test]
fn transient_ids_are_marked_seen_and_canonical_ids_are_not() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = memory_session(dir.path());
    let canonical = EntityId::mint_canonical();
    let mut pinned = author("Pinned");
    pinned.id = Some(canonical);
    let topic = Topic {
        id: None,
        name: "graphs".to_string(),
    };

    session.acquire_one(&pinned.into()).unwrap();
    let topic_id = session.acquire_one(&topic.into()).unwrap();

    assert!(session.has_seen(topic_id));
    assert!(!session.has_seen(canonical));
    let marker: Option<EntityId> = session
        .connection()
        .query_row(
            "SELECT canonical FROM canonical_id WHERE hashid = ?1;",
            [topic_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(marker, None);
    assert_eq!(count(session.connection(), "canonical_id"), 1);
}

#[test]
fn canonical_entities_are_always_reabsorbed() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = memory_session(dir.path());
    let canonical = EntityId::mint_canonical();

    let mut first = author("Ada");
    first.id = Some(canonical);
    session.acquire_one(&first.clone().into()).unwrap();

    let mut second = first;
    second.name = "Ada Lovelace".to_string();
    second.aliases.push("A. Lovelace".to_string());
    let id = session.acquire_one(&second.into()).unwrap();

    assert_eq!(id, canonical);
    let conn = session.connection();
    let name: String = conn
        .query_row("SELECT name FROM author WHERE author_id = ?1;", [id], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(name, "Ada Lovelace");
    assert_eq!(count(conn, "author"), 1);
    assert_eq!(count(conn, "author_alias"), 1);
}

#[test]
fn bare_link_is_rejected_and_rolls_back_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = memory_session(dir.path());
    let partition = session.history().partition_path();
    let paper: Entity = simple_paper("T").into();
    let batch = vec![paper.clone(), Link::new("doi", "10.1/x").into()];

    let err = session.import(&batch).unwrap_err();

    assert!(matches!(err, StoreError::UnsupportedEntity("link")));
    assert_eq!(total_rows(session.connection()), 0);
    assert!(!partition.exists());

    let ids = session.import(&[paper]).unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(count(session.connection(), "paper"), 1);
    assert_eq!(count(session.connection(), "paper_author"), 1);
}

#[test]
fn import_appends_committed_batches_to_history() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = memory_session(dir.path());
    session.set_history(
        HistoryLog::with_partition(dir.path().join("history"), "2024-05-01-000000.jsonl")
            .unwrap(),
    );

    session.import(&[]).unwrap();
    assert!(!session.history().partition_path().exists());

    session
        .import(&[simple_paper("One").into(), simple_paper("Two").into()])
        .unwrap();
    session.import(&[simple_paper("Three").into()]).unwrap();

    let text = std::fs::read_to_string(session.history().partition_path()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|line| line.starts_with("{\"kind\":\"paper\"")));
}

#[test]
fn invalid_config_is_rejected_before_opening() {
    match Session::open(StoreConfig::new("")) {
        Err(StoreError::Config(_)) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("empty history root was accepted"),
    }
}

fn memory_session(root: &std::path::Path) -> Session {
    Session::open(StoreConfig::new(root.join("history"))).unwrap()
}

fn author(name: &str) -> Author {
    Author {
        id: None,
        name: name.to_string(),
        links: Vec::new(),
        aliases: Vec::new(),
        roles: Vec::new(),
    }
}

fn venue(name: &str) -> Venue {
    Venue {
        id: None,
        venue_type: VenueType::Conference,
        name: name.to_string(),
        links: Vec::new(),
    }
}

fn simple_paper(title: &str) -> Paper {
    Paper {
        id: None,
        title: title.to_string(),
        abstract_text: None,
        citation_count: None,
        authors: vec![PaperAuthor {
            author: author("A"),
            affiliations: Vec::new(),
        }],
        releases: vec![Release {
            id: None,
            date: NaiveDate::from_ymd_opt(2023, 7, 1).unwrap(),
            date_precision: DatePrecision::Day,
            status: "published".to_string(),
            volume: None,
            publisher: None,
            venue: venue("V"),
        }],
        topics: Vec::new(),
        links: Vec::new(),
        scrapers: Vec::new(),
    }
}

fn rich_paper() -> Paper {
    let lab = Institution {
        id: None,
        name: "Lab".to_string(),
        category: InstitutionCategory::Academia,
    };
    let mut first = author("Grace");
    first.aliases.push("G. Hopper".to_string());
    first.links.push(Link::new("orcid", "0000-0001"));
    first.roles.push(Role {
        institution: lab.clone(),
        role: "professor".to_string(),
        start_date: NaiveDate::from_ymd_opt(2019, 9, 1),
        end_date: None,
    });

    let mut paper = simple_paper("Compilers");
    paper.abstract_text = Some("We compile.".to_string());
    paper.citation_count = Some(12);
    paper.authors = vec![
        PaperAuthor {
            author: first,
            affiliations: vec![lab],
        },
        PaperAuthor {
            author: author("Second"),
            affiliations: Vec::new(),
        },
    ];
    paper.releases[0].venue.links.push(Link::new("dblp", "conf/v"));
    paper.topics = vec![
        Topic {
            id: None,
            name: "compilers".to_string(),
        },
        Topic {
            id: None,
            name: "languages".to_string(),
        },
    ];
    paper.links.push(Link::new("arxiv", "2301.00001"));
    paper.scrapers.push("semantic_scholar".to_string());
    paper
}

const TABLES: &[&str] = &[
    "paper",
    "author",
    "institution",
    "venue",
    "release",
    "topic",
    "paper_author",
    "paper_author_institution",
    "paper_release",
    "paper_topic",
    "paper_link",
    "paper_scraper",
    "author_link",
    "author_alias",
    "author_institution",
    "venue_link",
    "canonical_id",
];

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn total_rows(conn: &Connection) -> i64 {
    TABLES.iter().map(|table| count(conn, table)).sum()
}

fn dump(conn: &Connection) -> Vec<(String, Vec<String>)> {
    TABLES
        .iter()
        .map(|table| {
            let mut stmt = conn.prepare(&format!("SELECT * FROM {table};")).unwrap();
            let columns = stmt.column_count();
            let mut rows: Vec<String> = stmt
                .query_map([], |row| {
                    (0..columns)
                        .map(|index| {
                            row.get::<_, rusqlite::types::Value>(index)
                                .map(|value| format!("{value:?}"))
                        })
                        .collect::<Result<Vec<_>, _>>()
                        .map(|values| values.join("|"))
                })
                .unwrap()
                .collect::<Result<_, _>>()
                .unwrap();
            rows.sort();
            (table.to_string(), rows)
        })
        .collect()
}
