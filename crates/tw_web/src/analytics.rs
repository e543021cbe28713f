//! Word frequencies and crawl volume over the stored articles. Everything is
//! recomputed from scratch on each request.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use std::sync::OnceLock;
use tw_core::{Article, Error};

pub const DEFAULT_TOP_WORDS: usize = 10;

/// Common Indonesian function words.
const INDONESIAN_STOPWORDS: &[&str] = &[
    "ada", "adalah", "agar", "akan", "aku", "anda", "antara", "apa", "apabila", "atau",
    "bagaimana", "bagi", "bahkan", "bahwa", "baik", "banyak", "beberapa", "begitu", "belum",
    "benar", "berada", "berbagai", "bisa", "boleh", "bukan", "cukup", "dalam", "dan", "dapat",
    "dari", "daripada", "demikian", "dengan", "di", "dia", "dirinya", "hal", "hanya", "harus",
    "hingga", "ia", "ialah", "ini", "itu", "jadi", "jika", "juga", "kalau", "kami", "kamu",
    "karena", "ke", "kemudian", "kepada", "ketika", "kita", "lagi", "lain", "lebih", "maka",
    "mampu", "masih", "melalui", "memang", "mereka", "merupakan", "meski", "mungkin", "namun",
    "oleh", "pada", "para", "pun", "saat", "saja", "sama", "sambil", "sampai", "sangat",
    "satu", "saya", "seakan", "sebagai", "sebelum", "sebuah", "sedang", "sehingga", "sejak",
    "sekali", "selain", "selalu", "seluruh", "semua", "sendiri", "seperti", "serta", "setelah",
    "siapa", "suatu", "sudah", "supaya", "tapi", "telah", "tentang", "terhadap", "tersebut",
    "tetapi", "tidak", "untuk", "walau", "yaitu", "yakni", "yang",
];

/// Words that dominate this site's pages without saying anything about the tag.
const SITE_STOPWORDS: &[&str] = &[
    "menjadi", "lebih", "banyak", "memiliki", "dapat", "akan", "dengan", "adalah", "karena",
    "juga", "seperti", "dalam", "yang", "untuk", "oleh", "sudah", "masih", "namun", "hingga",
    "tanpa", "pada", "bahwa", "agar", "berbagai", "orang", "memberikan", "kompasiana",
    "komentar", "selanjutnya", "ن", "ا",
];

fn stopwords() -> &'static HashSet<&'static str> {
    static STOPWORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    STOPWORDS.get_or_init(|| {
        INDONESIAN_STOPWORDS
            .iter()
            .chain(SITE_STOPWORDS.iter())
            .copied()
            .collect()
    })
}

pub fn is_stopword(word: &str) -> bool {
    stopwords().contains(word)
}

/// Lower-case and split on anything that is not a letter or digit.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

/// The `limit` most frequent non-stopwords. Ties keep first-seen order.
pub fn top_words<'a>(contents: impl IntoIterator<Item = &'a str>, limit: usize) -> Vec<WordCount> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut next_index = 0;
    for content in contents {
        for token in tokenize(content) {
            if is_stopword(&token) {
                continue;
            }
            let entry = counts.entry(token).or_insert_with(|| {
                next_index += 1;
                (0, next_index)
            });
            entry.0 += 1;
        }
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(word, (count, first_seen))| (word, count, first_seen))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(word, count, _)| WordCount { word, count })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Daily,
    /// Weeks start on Monday
    Weekly,
}

impl FromStr for GroupBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(GroupBy::Daily),
            "weekly" => Ok(GroupBy::Weekly),
            other => Err(Error::Config(format!("unknown grouping '{}', expected daily or weekly", other))),
        }
    }
}

impl GroupBy {
    pub fn period_of(&self, date: NaiveDate) -> NaiveDate {
        match self {
            GroupBy::Daily => date,
            GroupBy::Weekly => date - Duration::days(date.weekday().num_days_from_monday() as i64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodCount {
    pub period: NaiveDate,
    pub count: usize,
}

/// Articles stored per day or week, oldest period first. Periods without articles are omitted.
pub fn crawl_volume(articles: &[Article], group_by: GroupBy) -> Vec<PeriodCount> {
    let mut periods: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for article in articles {
        *periods
            .entry(group_by.period_of(article.created_at.date_naive()))
            .or_default() += 1;
    }
    periods
        .into_iter()
        .map(|(period, count)| PeriodCount { period, count })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn article_at(url: &str, y: i32, m: u32, d: u32) -> Article {
        Article {
            url: url.to_string(),
            title: String::new(),
            content: String::new(),
            created_at: Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Batik_Modern, GAYA-hidup!  2024"),
            vec!["batik", "modern", "gaya", "hidup", "2024"]
        );
        assert!(tokenize(" ...  ").is_empty());
    }

    #[test]
    fn test_top_words_filters_stopwords() {
        let contents = [
            "Batik yang modern dan batik klasik",
            "Kompasiana: batik untuk semua, modern sekali",
        ];
        let top = top_words(contents.iter().copied(), 10);
        assert_eq!(
            top,
            vec![
                WordCount { word: "batik".to_string(), count: 3 },
                WordCount { word: "modern".to_string(), count: 2 },
                WordCount { word: "klasik".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_top_words_limit_and_ties() {
        let top = top_words(["zebra apel zebra apel mangga"], 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].word, "zebra");
        assert_eq!(top[1].word, "apel");
    }

    #[test]
    fn test_daily_volume() {
        let articles = vec![
            article_at("a", 2024, 5, 6),
            article_at("b", 2024, 5, 6),
            article_at("c", 2024, 5, 8),
        ];
        let volume = crawl_volume(&articles, GroupBy::Daily);
        assert_eq!(volume.len(), 2);
        assert_eq!(volume[0].period, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
        assert_eq!(volume[0].count, 2);
        assert_eq!(volume[1].count, 1);
    }

    #[test]
    fn test_weekly_volume_starts_monday() {
        // 2024-05-06 is a Monday, 2024-05-12 the Sunday of that week
        let articles = vec![
            article_at("a", 2024, 5, 12),
            article_at("b", 2024, 5, 6),
            article_at("c", 2024, 5, 13),
        ];
        let volume = crawl_volume(&articles, GroupBy::Weekly);
        assert_eq!(
            volume,
            vec![
                PeriodCount { period: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(), count: 2 },
                PeriodCount { period: NaiveDate::from_ymd_opt(2024, 5, 13).unwrap(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_group_by_parse() {
        assert_eq!("Weekly".parse::<GroupBy>().unwrap(), GroupBy::Weekly);
        assert!("monthly".parse::<GroupBy>().is_err());
    }
}
