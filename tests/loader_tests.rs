use commune_finance::annex::{summarize_services, ServiceType};
use commune_finance::loader::{parse_bytes, SourceEncoding};
use commune_finance::reports::{self, RankingMetric};
use commune_finance::{ColumnRole, DashboardConfig, DashboardError, Pipeline};
use pretty_assertions::assert_eq;

const OFGL_SAMPLE: &str = "\
Exercice;Outre-mer;Code Insee 2024 Région;Nom 2024 Région;Code Insee 2024 Département;Nom 2024 Département;Code Siren Collectivité;Code Insee 2024 Commune;Nom 2024 Commune;Code Siren 2024 EPCI;Nom 2024 EPCI;Type de budget;Libellé Budget;Agrégat;Montant;Population totale
2017;Oui;04;La Réunion;974;La Réunion;219740115;97411;Saint-Denis;249740119;CINOR;Budget principal;SAINT-DENIS;Recettes totales hors emprunts;400 000 000;147 931
2017;Oui;04;La Réunion;974;La Réunion;219740115;97411;Saint-Denis;249740119;CINOR;Budget principal;SAINT-DENIS;Epargne brute;30 000 000;147 931
2017;Oui;04;La Réunion;974;La Réunion;219740115;97411;Saint-Denis;249740119;CINOR;Budget annexe;REGIE EAU;Recettes totales hors emprunts;12 000 000;147 931
2017;Oui;04;La Réunion;974;La Réunion;219740115;97411;Saint-Denis;249740119;CINOR;Budget annexe;POMPES FUNEBRES;Recettes totales hors emprunts;1 000 000;147 931
2017;Oui;04;La Réunion;974;La Réunion;219740107;97407;Le Port;249740077;TCO;Budget principal;LE PORT;Capacité ou besoin de financement;-2 500 000;33 531
2017;Non;11;Île-de-France;75;Paris;217500016;75056;Paris;200054781;Métropole du Grand Paris;Budget principal;PARIS;Epargne brute;900 000 000;2 165 423
";

#[test]
fn ofgl_export_runs_end_to_end() {
    let (table, report) = parse_bytes(OFGL_SAMPLE.as_bytes()).unwrap();
    assert_eq!(report.delimiter, ';');
    assert_eq!(report.encoding, SourceEncoding::Utf8);
    assert_eq!(report.total_rows, 6);
    assert_eq!(report.skipped_rows, 0);

    let config = DashboardConfig::default();
    let outcome = Pipeline::new(&config).run(&table).unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.roles.name(ColumnRole::Entity), Some("Nom 2024 Commune"));
    assert_eq!(outcome.roles.name(ColumnRole::Scope), Some("Code Insee 2024 Département"));
    assert_eq!(outcome.roles.name(ColumnRole::Group), Some("Nom 2024 EPCI"));
    assert_eq!(outcome.filter.kept_rows, 5);

    let sd = &outcome.records[0];
    assert_eq!(sd.entity(), "Saint-Denis");
    assert_eq!(sd.base.group.as_deref(), Some("CINOR"));
    assert_eq!(sd.base.population, Some(147_931.0));
    // Main and annex budgets are both summed unless a budget type is chosen.
    assert_eq!(sd.base.revenue, 413.0);
    assert_eq!(sd.base.gross_savings, 30.0);

    let services = summarize_services(
        &outcome.filtered_rows,
        &outcome.roles,
        &config.annex_budget_type,
        config.amount_unit,
    )
    .unwrap();
    let kinds: Vec<ServiceType> = services.iter().map(|s| s.service).collect();
    assert_eq!(kinds, vec![ServiceType::Water, ServiceType::FuneralServices]);
    assert_eq!(services[0].total_amount, 12.0);
}

#[test]
fn budget_type_selection() {
    let (table, _) = parse_bytes(OFGL_SAMPLE.as_bytes()).unwrap();
    let config = DashboardConfig {
        budget_types: ["Budget principal".to_string()].into_iter().collect(),
        ..DashboardConfig::default()
    };
    let outcome = Pipeline::new(&config).run(&table).unwrap();
    assert_eq!(outcome.records[0].base.revenue, 400.0);

    let ranking = reports::generate_ranking(
        &outcome.records,
        RankingMetric::FinancingCapacityPerCapita,
        Some(2017),
        10,
    );
    assert_eq!(ranking.len(), 1);
    assert_eq!(ranking[0].commune, "Le Port");
}

#[test]
fn latin1_comma_separated() {
    let mut bytes: Vec<u8> = Vec::new();
    bytes.extend_from_slice(b"Commune,Exercice,Agr\xe9gat,Montant\n");
    bytes.extend_from_slice(b"Saint-Andr\xe9,2019,Imp\xf4ts et taxes,\"1 500 000\"\n");
    let (table, report) = parse_bytes(&bytes).unwrap();
    assert_eq!(report.encoding, SourceEncoding::Latin1);
    assert_eq!(report.delimiter, ',');
    assert_eq!(table.headers[2], "Agrégat");

    let config = DashboardConfig {
        scope_code: None,
        ..DashboardConfig::default()
    };
    let outcome = Pipeline::new(&config).run(&table).unwrap();
    let r = &outcome.records[0];
    assert_eq!(r.entity(), "Saint-André");
    assert_eq!(r.base.taxes_and_duties, 1.5);
}

#[test]
fn empty_input_is_rejected() {
    assert!(matches!(parse_bytes(b"  \n"), Err(DashboardError::EmptyInput)));
}
