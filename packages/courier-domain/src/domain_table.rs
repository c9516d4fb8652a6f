use std::collections::BTreeMap;

use crate::terms;

/// Intent that carries no domain signal.
pub const GENERAL_INTENT: &str = "general";

const BUILTIN: &[(&str, &[&str])] = &[
	("finanzas", &["factura", "pago", "banco", "transferencia", "presupuesto", "impuestos"]),
	("reuniones", &["reunion", "agenda", "convocatoria", "calendario", "acta"]),
	("viajes", &["vuelo", "hotel", "reserva", "itinerario", "billete"]),
	("rrhh", &["nomina", "vacaciones", "contrato", "contratacion", "evaluacion"]),
	("soporte", &["incidencia", "ticket", "error", "averia", "soporte"]),
	("compras", &["pedido", "envio", "proveedor", "albaran", "devolucion"]),
	("legal", &["contrato", "clausula", "acuerdo", "confidencialidad", "litigio"]),
	("marketing", &["publicidad", "campana", "newsletter", "promocion", "oferta"]),
	("proyectos", &["proyecto", "entrega", "hito", "planificacion", "seguimiento"]),
];

/// Immutable lookup from an intent tag to the domain tags indexed on matching documents.
///
/// Built once at startup; configuration entries replace the built-in tags for their intent.
#[derive(Clone, Debug)]
pub struct DomainTable {
	entries: BTreeMap<String, Vec<String>>,
}
impl DomainTable {
	pub fn builtin() -> Self {
		let entries = BUILTIN
			.iter()
			.map(|(intent, tags)| {
				((*intent).to_string(), tags.iter().map(|tag| (*tag).to_string()).collect())
			})
			.collect();

		Self { entries }
	}

	pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Self {
		let mut table = Self::builtin();

		for (intent, tags) in overrides {
			let intent = terms::normalize_term(intent);
			let mut normalized = Vec::with_capacity(tags.len());

			for tag in tags {
				let tag = terms::normalize_term(tag);

				if !tag.is_empty() && !normalized.contains(&tag) {
					normalized.push(tag);
				}
			}

			if intent.is_empty() || normalized.is_empty() {
				continue;
			}

			table.entries.insert(intent, normalized);
		}

		table
	}

	pub fn from_config(cfg: &courier_config::Config) -> Self {
		Self::with_overrides(&cfg.domains)
	}

	/// Domain tags for an intent. The general intent and unknown intents have none.
	pub fn tags_for(&self, intent: &str) -> &[String] {
		let intent = terms::normalize_term(intent);

		if is_general(&intent) {
			return &[];
		}

		self.entries.get(&intent).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn intents(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
impl Default for DomainTable {
	fn default() -> Self {
		Self::builtin()
	}
}

pub fn is_general(intent: &str) -> bool {
	let trimmed = intent.trim();

	trimmed.is_empty() || trimmed.eq_ignore_ascii_case(GENERAL_INTENT)
}
