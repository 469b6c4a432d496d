use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref DIGITS: Regex = Regex::new(r"(?u)\d+").expect("valid regex");
    // Words may carry inner hyphens; apostrophe clitics ('s, 't) split off as their own token.
    static ref WORD: Regex = Regex::new(r"(?u)[\w-]+|'\w*").expect("valid regex");
}

/// Standard English stopword list (NLTK).
pub const ENGLISH_STOPWORDS: &[&str] = &[
    "i","me","my","myself","we","our","ours","ourselves","you","you're","you've","you'll","you'd","your","yours","yourself","yourselves",
    "he","him","his","himself","she","she's","her","hers","herself","it","it's","its","itself","they","them","their","theirs","themselves",
    "what","which","who","whom","this","that","that'll","these","those","am","is","are","was","were","be","been","being",
    "have","has","had","having","do","does","did","doing","a","an","the","and","but","if","or","because","as","until","while",
    "of","at","by","for","with","about","against","between","into","through","during","before","after","above","below",
    "to","from","up","down","in","out","on","off","over","under","again","further","then","once","here","there","when","where","why","how",
    "all","any","both","each","few","more","most","other","some","such","no","nor","not","only","own","same","so","than","too","very",
    "s","t","can","will","just","don","don't","should","should've","now","d","ll","m","o","re","ve","y",
    "ain","aren","aren't","couldn","couldn't","didn","didn't","doesn","doesn't","hadn","hadn't","hasn","hasn't","haven","haven't",
    "isn","isn't","ma","mightn","mightn't","mustn","mustn't","needn","needn't","shan","shan't","shouldn","shouldn't",
    "wasn","wasn't","weren","weren't","won","won't","wouldn","wouldn't",
];

/// Words that show up on nearly every product in the catalog and carry no ranking signal.
pub const CATALOG_STOPWORDS: &[&str] = &[
    "made","india","proudly","use","year","round","look","design","qualiti","day","make",
    "feel","perfect","great","wash","style",
];

/// Suffix-stripping transform applied to every surviving token.
pub trait Stem: Send + Sync {
    fn stem<'a>(&self, token: &'a str) -> Cow<'a, str>;
}

impl Stem for Stemmer {
    fn stem<'a>(&self, token: &'a str) -> Cow<'a, str> {
        Stemmer::stem(self, token)
    }
}

/// Leaves tokens untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStemming;

impl Stem for NoStemming {
    fn stem<'a>(&self, token: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(token)
    }
}

/// Turns raw text into normalized terms. Built once and shared read-only.
pub struct Tokenizer {
    stopwords: HashSet<String>,
    stemmer: Box<dyn Stem>,
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokenizer").field("stopwords", &self.stopwords.len()).finish_non_exhaustive()
    }
}

impl Default for Tokenizer {
    fn default() -> Self { Self::english() }
}

impl Tokenizer {
    /// Stopwords are matched against lowercased tokens, so they are lowercased here too.
    pub fn new<I, S>(stopwords: I, stemmer: impl Stem + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stopwords = stopwords.into_iter().map(|w| w.as_ref().to_lowercase()).collect();
        Self { stopwords, stemmer: Box::new(stemmer) }
    }

    /// English stopwords plus the catalog list, Snowball English stemmer.
    pub fn english() -> Self {
        let words = ENGLISH_STOPWORDS.iter().chain(CATALOG_STOPWORDS).copied();
        Self::new(words, Stemmer::create(Algorithm::English))
    }

    pub fn with_extra_stopwords<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stopwords.extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
        self
    }

    pub fn is_stopword(&self, token: &str) -> bool { self.stopwords.contains(token) }

    /// NFKC, strip digits, lowercase, split into words, keep purely alphanumeric
    /// non-stopwords, stem. Output keeps left-to-right order and duplicates.
    pub fn normalize(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let compat = text.nfkc().collect::<String>();
        let lowered = DIGITS.replace_all(&compat, "").to_lowercase();
        WORD.find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|token| token.chars().all(char::is_alphanumeric))
            .filter(|token| !self.is_stopword(token))
            .map(|token| self.stemmer.stem(token).into_owned())
            .collect()
    }
}
