use search_core::tokenizer::{NoStemming, Tokenizer};

#[test]
fn it_normalizes_and_stems() {
    let words = Tokenizer::english().normalize("Running Runners RUN! Shoes for the kids.");
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    assert!(words.contains(&"shoe".to_string()));
    assert!(words.contains(&"kid".to_string()));
}

#[test]
fn it_filters_stopwords() {
    let words = Tokenizer::english().normalize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert_eq!(words.len(), 5);
}

#[test]
fn it_keeps_order_and_duplicates() {
    let t = Tokenizer::new(["a"], NoStemming);
    assert_eq!(t.normalize("Shirt a SHIRT, 42 blue"), vec!["shirt", "shirt", "blue"]);
}

#[test]
fn it_is_deterministic() {
    let t = Tokenizer::english();
    let text = "Solid Men Round Neck Grey T-Shirt. Cotton blend, machine wash, 2 pack";
    assert_eq!(t.normalize(text), t.normalize(text));
}

#[test]
fn stopwords_are_swappable() {
    let custom = Tokenizer::new(["shirt"], NoStemming);
    assert_eq!(custom.normalize("the shirt"), vec!["the"]);
    assert!(Tokenizer::english().normalize("the shirt").contains(&"shirt".to_string()));
}
