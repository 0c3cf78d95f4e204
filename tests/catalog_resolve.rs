// tests/catalog_resolve.rs
//
// Catalog resolution and lifecycle as seen from the public API:
// built-ins, overrides, custom pillars and questions, display names.

use wellness_pillars::catalog::{resolve_catalog, resolve_pillar_display_names, CatalogLayers};
use wellness_pillars::pillars::BUILTIN_PILLARS;

#[test]
fn empty_layers_give_builtins_in_declared_order() {
    let catalog = resolve_catalog(&CatalogLayers::default());
    let ids: Vec<&str> = catalog.pillar_ids().collect();
    assert_eq!(
        ids,
        ["alimentation", "sport", "sommeil", "stress", "spiritualite", "social"]
    );
    assert_eq!(catalog.total_questions(), 13);
}

#[test]
fn custom_question_is_appended_after_builtin_sport_question() {
    let mut layers = CatalogLayers::default();
    layers
        .add_custom_question("sport", "Ai-je marché 10 000 pas ?", 1_700_000_000_000)
        .expect("sport exists");

    let catalog = layers.resolve();
    let sport = catalog.get("sport").expect("sport entry");
    assert_eq!(sport.questions.len(), 2);
    assert_eq!(sport.questions[0], BUILTIN_PILLARS[1].questions[0]);
    assert_eq!(sport.questions[1], "Ai-je marché 10 000 pas ?");
}

#[test]
fn override_replaces_whole_list_and_custom_questions_follow() {
    let mut layers = CatalogLayers::default();
    layers
        .set_default_override("sommeil", vec!["Couché avant 23h ?".into(), "Réveil reposé ?".into()])
        .unwrap();
    layers.add_custom_question("sommeil", "Sieste courte ?", 1).unwrap();

    let catalog = layers.resolve();
    assert_eq!(
        catalog.get("sommeil").unwrap().questions,
        ["Couché avant 23h ?", "Réveil reposé ?", "Sieste courte ?"]
    );

    assert!(layers.clear_default_override("sommeil"));
    assert_eq!(layers.resolve().question_count("sommeil"), Some(2));
}

#[test]
fn deleting_custom_pillar_cascades_to_its_questions() {
    let mut layers = CatalogLayers::default();
    let id = layers.add_custom_pillar("Lecture", "📚", 1_000).unwrap();
    layers.add_custom_question(&id, "Ai-je lu 20 pages ?", 2_000).unwrap();
    layers.add_custom_question(&id, "Ai-je pris des notes ?", 2_000).unwrap();
    layers.add_custom_question("social", "Ai-je appelé un proche ?", 3_000).unwrap();
    assert_eq!(layers.resolve().question_count(&id), Some(2));

    assert_eq!(layers.delete_custom_pillar(&id).unwrap(), 2);

    let catalog = layers.resolve();
    assert!(catalog.get(&id).is_none());
    assert_eq!(catalog.len(), 6);
    // unrelated custom question survives
    assert_eq!(catalog.question_count("social"), Some(4));
}

#[test]
fn builtin_pillars_cannot_be_deleted_or_duplicated() {
    let mut layers = CatalogLayers::default();
    assert!(layers.delete_custom_pillar("sport").is_err());
    assert!(layers.add_custom_pillar("sport", "", 1).is_err());
    assert!(layers.add_custom_pillar("   ", "", 1).is_err());
    assert!(layers.add_custom_question("nope", "Q ?", 1).is_err());
}

#[test]
fn generated_ids_are_unique_within_the_same_millisecond() {
    let mut layers = CatalogLayers::default();
    let a = layers.add_custom_pillar("Lecture", "📚", 42).unwrap();
    let b = layers.add_custom_pillar("Musique", "🎵", 42).unwrap();
    assert_ne!(a, b);
    assert!(a.starts_with("custom_") && b.starts_with("custom_"));
}

#[test]
fn display_names_prefer_builtins_and_fall_back_to_id() {
    let mut layers = CatalogLayers::default();
    let id = layers.add_custom_pillar("Lecture", "📚", 5).unwrap();
    let names = resolve_pillar_display_names(&layers.custom.custom_pillars);

    assert_eq!(names.display_name_for("sport"), "Sport 💪");
    assert_eq!(names.display_name_for(&id), "Lecture 📚");
    assert_eq!(names.display_name_for("ghost"), "ghost");
}

#[test]
fn resolution_is_deterministic() {
    let mut layers = CatalogLayers::default();
    layers.add_custom_pillar("Lecture", "📚", 5).unwrap();
    layers.add_custom_question("stress", "Respiration ?", 6).unwrap();
    assert_eq!(layers.resolve(), layers.resolve());
}
