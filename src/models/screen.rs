//! Screen definitions: which collection a view polls and how its rows are
//! searched, filtered, sorted and shown.
//!
//! The dashboard used to fork a component per screen; here every screen is
//! data. Built-in screens cover the backend's collections and can be
//! overridden or extended from the config file (`[[screens]]`).

use serde::{Deserialize, Serialize};

use super::filter_state::{FilterKind, FilterSpec};

/// The part of a screen the table engine needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Identifier field, unique within one snapshot
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Field used for descending sort
    pub timestamp_field: String,

    /// Fields searched by the free-text search
    #[serde(default)]
    pub search_fields: Vec<String>,

    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

fn default_id_field() -> String {
    "_id".to_string()
}

impl TableSchema {
    #[must_use]
    pub fn filter_spec(&self, key: &str) -> Option<&FilterSpec> {
        self.filters.iter().find(|f| f.key.eq_ignore_ascii_case(key))
    }
}

/// How a column's cells are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    #[default]
    Text,
    Timestamp,
    Money,
    Bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub header: String,
    pub field: String,
    #[serde(default)]
    pub kind: ColumnKind,
}

impl ColumnSpec {
    fn new(header: &str, field: &str, kind: ColumnKind) -> Self {
        Self {
            header: header.to_string(),
            field: field.to_string(),
            kind,
        }
    }
}

/// A named view over one backend collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenConfig {
    pub name: String,

    /// Collection path segment (`GET /api/<collection>`)
    pub collection: String,

    #[serde(default)]
    pub title: String,

    #[serde(flatten)]
    pub schema: TableSchema,

    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

impl ScreenConfig {
    /// Title for headers, falling back to the screen name.
    #[must_use]
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.name
        } else {
            &self.title
        }
    }
}

/// Built-in screens, one per backend collection the dashboard shows.
#[must_use]
pub fn builtin_screens() -> Vec<ScreenConfig> {
    use ColumnKind::{Bool, Money, Text, Timestamp};
    use FilterKind::{Date, Enum, Hour, Number};

    let screen = |name: &str,
                  collection: &str,
                  title: &str,
                  timestamp_field: &str,
                  search_fields: &[&str],
                  filters: Vec<FilterSpec>,
                  columns: Vec<ColumnSpec>| ScreenConfig {
        name: name.to_string(),
        collection: collection.to_string(),
        title: title.to_string(),
        schema: TableSchema {
            id_field: default_id_field(),
            timestamp_field: timestamp_field.to_string(),
            search_fields: search_fields.iter().map(|s| s.to_string()).collect(),
            filters,
        },
        columns,
    };

    vec![
        screen(
            "movimientos",
            "movimientos",
            "Movimientos de caja",
            "createdAt",
            &["patente", "descripcion", "operador"],
            vec![
                FilterSpec::new("tipo", "tipoVehiculo", Enum),
                FilterSpec::new("pago", "metodoPago", Enum),
                FilterSpec::new("factura", "factura", Enum),
                FilterSpec::new("operador", "operador", FilterKind::Text),
                FilterSpec::new("hora", "createdAt", Hour),
                FilterSpec::new("fecha", "createdAt", Date),
                FilterSpec::new("monto", "monto", Number),
            ],
            vec![
                ColumnSpec::new("Fecha", "createdAt", Timestamp),
                ColumnSpec::new("Patente", "patente", Text),
                ColumnSpec::new("Tipo", "tipoVehiculo", Text),
                ColumnSpec::new("Descripción", "descripcion", Text),
                ColumnSpec::new("Pago", "metodoPago", Text),
                ColumnSpec::new("Factura", "factura", Text),
                ColumnSpec::new("Operador", "operador", Text),
                ColumnSpec::new("Monto", "monto", Money),
            ],
        ),
        screen(
            "vehiculos",
            "vehiculos",
            "Vehículos",
            "estadiaActual.entrada",
            &["patente", "marca", "modelo", "color"],
            vec![
                FilterSpec::new("tipo", "tipoVehiculo", Enum),
                FilterSpec::new("abonado", "abonado", Enum),
                FilterSpec::new("hora", "estadiaActual.entrada", Hour),
                FilterSpec::new("fecha", "estadiaActual.entrada", Date),
            ],
            vec![
                ColumnSpec::new("Entrada", "estadiaActual.entrada", Timestamp),
                ColumnSpec::new("Patente", "patente", Text),
                ColumnSpec::new("Tipo", "tipoVehiculo", Text),
                ColumnSpec::new("Marca", "marca", Text),
                ColumnSpec::new("Modelo", "modelo", Text),
                ColumnSpec::new("Abonado", "abonado", Bool),
            ],
        ),
        screen(
            "tickets",
            "tickets",
            "Tickets abiertos",
            "creadoEn",
            &["ticket", "patente", "operador"],
            vec![
                FilterSpec::new("tipo", "tipoVehiculo", Enum),
                FilterSpec::new("hora", "creadoEn", Hour),
                FilterSpec::new("fecha", "creadoEn", Date),
            ],
            vec![
                ColumnSpec::new("Creado", "creadoEn", Timestamp),
                ColumnSpec::new("Ticket", "ticket", Text),
                ColumnSpec::new("Patente", "patente", Text),
                ColumnSpec::new("Tipo", "tipoVehiculo", Text),
                ColumnSpec::new("Operador", "operador", Text),
            ],
        ),
        screen(
            "abonos",
            "abonos",
            "Abonos",
            "createdAt",
            &["patente", "nombreApellido", "email", "telefono"],
            vec![
                FilterSpec::new("tipo", "tipoVehiculo", Enum),
                FilterSpec::new("activo", "activo", Enum),
                FilterSpec::new("vence", "fechaExpiracion", Date),
                FilterSpec::new("precio", "precio", Number),
            ],
            vec![
                ColumnSpec::new("Alta", "createdAt", Timestamp),
                ColumnSpec::new("Patente", "patente", Text),
                ColumnSpec::new("Cliente", "nombreApellido", Text),
                ColumnSpec::new("Tipo", "tipoVehiculo", Text),
                ColumnSpec::new("Vence", "fechaExpiracion", Timestamp),
                ColumnSpec::new("Precio", "precio", Money),
                ColumnSpec::new("Activo", "activo", Bool),
            ],
        ),
        screen(
            "turnos",
            "turnos",
            "Turnos",
            "createdAt",
            &["patente", "nombreTarifa"],
            vec![
                FilterSpec::new("pago", "metodoPago", Enum),
                FilterSpec::new("usado", "usado", Enum),
                FilterSpec::new("expirado", "expirado", Enum),
                FilterSpec::new("fecha", "createdAt", Date),
            ],
            vec![
                ColumnSpec::new("Creado", "createdAt", Timestamp),
                ColumnSpec::new("Patente", "patente", Text),
                ColumnSpec::new("Tarifa", "nombreTarifa", Text),
                ColumnSpec::new("Fin", "fin", Timestamp),
                ColumnSpec::new("Pago", "metodoPago", Text),
                ColumnSpec::new("Precio", "precio", Money),
                ColumnSpec::new("Usado", "usado", Bool),
                ColumnSpec::new("Expirado", "expirado", Bool),
            ],
        ),
        screen(
            "auditorias",
            "auditorias",
            "Auditorías",
            "fechaHora",
            &["operador", "estado"],
            vec![
                FilterSpec::new("estado", "estado", Enum),
                FilterSpec::new("operador", "operador", FilterKind::Text),
                FilterSpec::new("fecha", "fechaHora", Date),
            ],
            vec![
                ColumnSpec::new("Fecha", "fechaHora", Timestamp),
                ColumnSpec::new("Operador", "operador", Text),
                ColumnSpec::new("Estado", "estado", Text),
                ColumnSpec::new("Vehículos", "cantidadVehiculos", Text),
            ],
        ),
        screen(
            "cierres",
            "cierresdecaja",
            "Cierres de caja",
            "createdAt",
            &["operador"],
            vec![
                FilterSpec::new("operador", "operador", FilterKind::Text),
                FilterSpec::new("retirado", "retirado", Enum),
                FilterSpec::new("fecha", "fecha", Date),
                FilterSpec::new("hora", "createdAt", Hour),
            ],
            vec![
                ColumnSpec::new("Fecha", "createdAt", Timestamp),
                ColumnSpec::new("Operador", "operador", Text),
                ColumnSpec::new("Recaudado", "totalRecaudado", Money),
                ColumnSpec::new("Dejó en caja", "dejoEnCaja", Money),
                ColumnSpec::new("Rendido", "totalRendido", Money),
                ColumnSpec::new("Retirado", "retirado", Bool),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_screen_names_unique() {
        let screens = builtin_screens();
        let names: HashSet<_> = screens.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), screens.len());
    }

    #[test]
    fn test_builtin_filter_keys_unique_per_screen() {
        for screen in builtin_screens() {
            let keys: HashSet<_> = screen.schema.filters.iter().map(|f| &f.key).collect();
            assert_eq!(keys.len(), screen.schema.filters.len(), "{}", screen.name);
            assert!(!screen.columns.is_empty(), "{}", screen.name);
        }
    }

    #[test]
    fn test_cierres_polls_cierresdecaja() {
        let cierres = builtin_screens()
            .into_iter()
            .find(|s| s.name == "cierres")
            .unwrap();
        assert_eq!(cierres.collection, "cierresdecaja");
    }

    #[test]
    fn test_filter_spec_lookup_is_case_insensitive() {
        let movimientos = &builtin_screens()[0];
        assert!(movimientos.schema.filter_spec("TIPO").is_some());
        assert!(movimientos.schema.filter_spec("color").is_none());
    }

    #[test]
    fn test_screen_from_toml() {
        let toml_str = r#"
            name = "tarifas"
            collection = "tarifas"
            timestamp_field = "updatedAt"
            search_fields = ["nombre"]

            [[filters]]
            key = "tipo"
            field = "tipo"
            kind = "enum"

            [[columns]]
            header = "Nombre"
            field = "nombre"
        "#;
        let screen: ScreenConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(screen.schema.id_field, "_id");
        assert_eq!(screen.schema.filters[0].kind, FilterKind::Enum);
        assert_eq!(screen.columns[0].kind, ColumnKind::Text);
        assert_eq!(screen.display_title(), "tarifas");
    }
}
