//! Shareable room links: the room code travels in the `room` query parameter.

use reqwest::Url;

/// Query parameter carrying the room code.
pub const ROOM_QUERY_PARAM: &str = "room";

/// Room code found in `url`, if any.
pub fn room_id_from_url(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == ROOM_QUERY_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Link inviting others to `room_id`, built on top of the page at `base`.
pub fn share_link(base: &Url, room_id: &str) -> Url {
    let mut link = base.clone();
    link.set_fragment(None);
    link.query_pairs_mut()
        .clear()
        .append_pair(ROOM_QUERY_PARAM, room_id);
    link
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_room_from_query() {
        let url = Url::parse("https://arranjo.example/?room=K3X9QZ").unwrap();
        assert_eq!(room_id_from_url(&url), Some("K3X9QZ".to_string()));

        let url = Url::parse("https://arranjo.example/?lang=pt&room=ABC123").unwrap();
        assert_eq!(room_id_from_url(&url), Some("ABC123".to_string()));
    }

    #[test]
    fn missing_or_empty_room_is_none() {
        let url = Url::parse("https://arranjo.example/").unwrap();
        assert_eq!(room_id_from_url(&url), None);

        let url = Url::parse("https://arranjo.example/?room=").unwrap();
        assert_eq!(room_id_from_url(&url), None);
    }

    #[test]
    fn share_link_replaces_existing_query() {
        let base = Url::parse("https://arranjo.example/play?room=OLD000#rules").unwrap();
        let link = share_link(&base, "NEW111");
        assert_eq!(link.as_str(), "https://arranjo.example/play?room=NEW111");
        assert_eq!(room_id_from_url(&link), Some("NEW111".to_string()));
    }
}
