use crate::error::{RecError, Result};
use crate::types::{RawEvent, WeightedInteraction};
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// steam-200k.csv を読み込む。ヘッダなし、5列目 (extra) は無視する。
pub fn load_steam_200k_csv(path: impl AsRef<Path>) -> Result<Vec<RawEvent>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RecError::DatasetNotFound(path.to_path_buf()));
    }
    let file = std::fs::File::open(path)?;
    let events = read_raw_events(file)?;
    info!(path = %path.display(), rows = events.len(), "loaded raw events");
    Ok(events)
}

pub fn read_raw_events<R: Read>(reader: R) -> Result<Vec<RawEvent>> {
    let mut data = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let headers = csv::StringRecord::from(vec!["user_id", "game", "behavior", "value"]);
    let mut events = Vec::new();
    for record in data.records() {
        let record = record?;
        let trimmed: csv::StringRecord = record.iter().take(4).collect();
        events.push(trimmed.deserialize(Some(&headers))?);
    }
    Ok(events)
}

/// ソート済みのIDに 0..len の連番を振る
#[derive(Debug, Clone)]
pub struct IdEncoder<K> {
    map: HashMap<K, usize>,
    reverse_map: Vec<K>,
}

impl<K: Ord + Hash + Clone> IdEncoder<K> {
    /// 重複ありのIDを受け取り、昇順に並べて連番を振る
    pub fn new(ids: impl IntoIterator<Item = K>) -> Self {
        let reverse_map: Vec<K> = ids.into_iter().collect::<BTreeSet<K>>().into_iter().collect();
        let map = reverse_map
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        Self { map, reverse_map }
    }

    pub fn encode<Q>(&self, id: &Q) -> Option<usize>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(id).copied()
    }

    pub fn decode(&self, idx: usize) -> Option<&K> {
        self.reverse_map.get(idx)
    }

    pub fn ids(&self) -> &[K] {
        &self.reverse_map
    }

    pub fn len(&self) -> usize {
        self.reverse_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse_map.is_empty()
    }
}

/// ユーザーとゲームの索引。インタラクションのスナップショットから毎回作り直す。
#[derive(Debug, Clone)]
pub struct Dataset {
    pub users: IdEncoder<u64>,
    pub games: IdEncoder<String>,
}

impl Dataset {
    pub fn index(interactions: &[WeightedInteraction]) -> Self {
        let users = IdEncoder::new(interactions.iter().map(|x| x.user_id));
        let games = IdEncoder::new(interactions.iter().map(|x| x.game.clone()));
        debug!(users = users.len(), games = games.len(), "indexed dataset");
        Self { users, games }
    }

    pub fn user_ids(&self) -> &[u64] {
        self.users.ids()
    }

    pub fn game_titles(&self) -> &[String] {
        self.games.ids()
    }

    pub fn user_index(&self, user_id: u64) -> Result<usize> {
        self.users
            .encode(&user_id)
            .ok_or(RecError::UnknownUser(user_id))
    }

    pub fn game_index(&self, title: &str) -> Result<usize> {
        self.games
            .encode(title)
            .ok_or_else(|| RecError::UnknownGame(title.to_string()))
    }

    pub fn contains_user(&self, user_id: u64) -> bool {
        self.users.encode(&user_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
151603712,\"The Elder Scrolls V Skyrim\",purchase,1.0,0
151603712,\"The Elder Scrolls V Skyrim\",play,273.0,0
59945701,\"Fallout 4\",purchase,1.0,0
59945701,\"Fallout 4\",play,0.5,0
";

    fn interactions() -> Vec<WeightedInteraction> {
        vec![
            WeightedInteraction::new(30, "Portal", 1.0),
            WeightedInteraction::new(10, "Dota 2", 2.0),
            WeightedInteraction::new(20, "Portal", 1.5),
            WeightedInteraction::new(10, "Counter-Strike", 0.7),
        ]
    }

    #[test]
    fn test_read_raw_events() -> Result<()> {
        let events = read_raw_events(CSV.as_bytes())?;
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[1],
            RawEvent::new(151603712, "The Elder Scrolls V Skyrim", "play", 273.0)
        );
        assert_eq!(events[2].behavior, "purchase");
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = load_steam_200k_csv("does/not/exist.csv").unwrap_err();
        assert!(matches!(err, RecError::DatasetNotFound(_)));
    }

    #[test]
    fn test_indices_are_sorted() {
        let ds = Dataset::index(&interactions());
        assert_eq!(ds.user_ids(), &[10, 20, 30]);
        assert_eq!(
            ds.game_titles(),
            &["Counter-Strike".to_string(), "Dota 2".to_string(), "Portal".to_string()]
        );
        assert_eq!(ds.user_index(10).unwrap(), 0);
        assert_eq!(ds.game_index("Portal").unwrap(), 2);
    }

    #[test]
    fn test_indices_round_trip() {
        let ds = Dataset::index(&interactions());
        for (i, uid) in ds.user_ids().iter().enumerate() {
            assert_eq!(ds.user_index(*uid).unwrap(), i);
            assert_eq!(ds.users.decode(i), Some(uid));
        }
        for (i, title) in ds.game_titles().iter().enumerate() {
            assert_eq!(ds.game_index(title).unwrap(), i);
        }
        assert_eq!(ds.users.decode(ds.users.len()), None);
    }

    #[test]
    fn test_unknown_entities() {
        let ds = Dataset::index(&interactions());
        assert!(matches!(ds.user_index(99), Err(RecError::UnknownUser(99))));
        assert!(matches!(ds.game_index("Tetris"), Err(RecError::UnknownGame(_))));
        assert!(!ds.contains_user(99));
        // 問い合わせで勝手に登録されない
        assert_eq!(ds.users.len(), 3);
    }
}
