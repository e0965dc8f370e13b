use anyhow::Result;

use skgif_core::filter::TopicSearch;
use skgif_core::topic_index::TopicIndex;

use crate::config::Config;
use crate::services::load_topic_index;

/// CLI entry point: search thesaurus labels and print matching topics.
pub fn run_topics(config: &Config, term: &str, lang: &str) -> Result<()> {
    let search = TopicSearch::new(term, lang)?;
    let index = load_topic_index(config)?;
    print_topics(&index, &search);
    Ok(())
}

fn print_topics(index: &TopicIndex, search: &TopicSearch) {
    let lang = search.language.as_str();
    let hits = index.search(&search.term, lang);
    if hits.is_empty() {
        println!("No results.");
        return;
    }

    for (i, concept) in hits.iter().enumerate() {
        let label = concept
            .pref_labels
            .get(lang)
            .or_else(|| concept.pref_labels.get("en"))
            .map(String::as_str)
            .unwrap_or("(unlabelled)");
        println!("{}. {}", i + 1, label);
        println!("    id: {}", concept.id);
        if !concept.broader.is_empty() {
            println!("    broader: {}", concept.broader.join(", "));
        }
        println!();
    }
}
