//! Dimension, unit and kind registry
//!
//! One registry holds three append-only tables: base dimension symbols, unit
//! symbols (resolved through the metric prefixes) and named kinds. All of
//! them sit behind a single `RwLock`: definitions hold the write lock for the
//! whole check-then-insert, lookups share the read lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::f64::consts::PI;
use std::sync::{LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::Deserialize;
use tracing::{debug, error, warn};
use physq_core::{check_symbol, DimensionVector, UnitError};
use crate::kind::Kind;
use crate::parse::parse_quantity;
use crate::quantity::Quantity;
use crate::unit::{prefix_splits, Unit, PREFIXES};

/// Process-wide SI registry, seeded on first access
pub static SI: LazyLock<Registry> = LazyLock::new(Registry::si);

/// Base dimensions of the SI seed (plus the plane angle Φ)
const SI_DIMENSIONS: [&str; 8] = ["T", "L", "M", "I", "Θ", "N", "J", "Φ"];

/// Named kinds of the SI seed, as (name, canonical dimension)
const SI_KINDS: &[(&str, &str)] = &[
    ("Time", "T"),
    ("Length", "L"),
    ("Mass", "M"),
    ("ElectricCurrent", "I"),
    ("Temperature", "Θ"),
    ("AmountOfSubstance", "N"),
    ("LuminousFlux", "J"),
    ("LuminousIntensity", "J"),
    ("Angle", "Φ"),
    ("Area", "L^2"),
    ("Volume", "L^3"),
    ("WaveNumber", "/L"),
    ("Vergence", "/L"),
    ("Velocity", "L/T"),
    ("Speed", "L/T"),
    ("Acceleration", "L/T^2"),
    ("Force", "M*L/T^2"),
    ("Weight", "M*L/T^2"),
    ("Pressure", "M/L/T^2"),
    ("Stress", "M/L/T^2"),
    ("Tension", "M/T^2"),
    ("Energy", "M*L^2/T^2"),
    ("Work", "M*L^2/T^2"),
    ("Heat", "M*L^2/T^2"),
    ("Power", "M*L^2/T^3"),
    ("Density", "M/L^3"),
    ("SpecificVolume", "L^3/M"),
    ("MassConcentration", "L^3/M"),
    ("SurfaceDensity", "M/L^2"),
    ("Viscosity", "M/L/T"),
    ("Frequency", "/T"),
    ("Radioactivity", "/T"),
    ("CurrentDensity", "I/L^2"),
    ("MagneticFieldStrength", "I/L"),
    ("Charge", "I*T"),
    ("ElectricPotential", "M*L^2/I/T^3"),
    ("Capacitance", "T^4*I^2/M/L^2"),
    ("Resistance", "M*L^2/I^2/T^3"),
    ("Impedance", "M*L^2/I^2/T^3"),
    ("Reactance", "M*L^2/I^2/T^3"),
    ("Conductance", "T^3*I^2/M/L^2"),
    ("MagneticFlux", "M*L^2/I/T^2"),
    ("MagneticFluxDensity", "M/I/T^2"),
    ("Inductance", "M*L^2/I^2/T^2"),
    ("Illuminance", "J/L^2"),
    ("AbsorbedDose", "L^2/T^2"),
    ("EquivalentDose", "L^2/T^2"),
    ("Concentration", "N/L^3"),
    ("CatalyticActivity", "N/T"),
];

/// Derived and non-coherent SI units, each defined by a literal over the
/// units registered before it
const SI_DERIVED_UNITS: &[(&str, &str)] = &[
    ("N", "kg*m/s2"),   // newton
    ("Pa", "N/m2"),     // pascal
    ("J", "N*m"),       // joule
    ("W", "J/s"),       // watt
    ("Hz", "/s"),       // hertz
    ("C", "A*s"),       // coulomb
    ("V", "J/C"),       // volt
    ("F", "C/V"),       // farad
    ("Ω", "V/A"),       // ohm
    ("S", "/Ω"),        // siemens
    ("Wb", "V*s"),      // weber
    ("T", "Wb/m2"),     // tesla
    ("H", "Wb/A"),      // henry
    ("lm", "cd"),       // lumen
    ("lx", "lm/m2"),    // lux
    ("Bq", "/s"),       // becquerel
    ("Gy", "J/kg"),     // gray
    ("Sv", "J/kg"),     // sievert
    ("kat", "mol/s"),   // katal
    ("min", "60s"),
    ("h", "60min"),
    ("day", "24h"),
    ("au", "149597870700m"),
    ("ha", "hm2"),
    ("L", "dm3"),
    ("t", "1000kg"),
    ("Da", "1.66053904020yg"),
    ("eV", ".1602176634aJ"),
];

/// Right-hand side of a unit definition
#[derive(Debug, Clone)]
pub enum Definition<'a> {
    /// A quantity in reference units
    Quantity(Quantity<f64>),
    /// A literal over already defined units, e.g. `"kg*m/s2"`
    Literal(&'a str),
}

impl From<Quantity<f64>> for Definition<'_> {
    fn from(quantity: Quantity<f64>) -> Self {
        Definition::Quantity(quantity)
    }
}

impl<'a> From<&'a str> for Definition<'a> {
    fn from(literal: &'a str) -> Self {
        Definition::Literal(literal)
    }
}

/// One row of a JSON unit table
#[derive(Debug, Deserialize)]
struct UnitEntry {
    symbol: String,
    definition: String,
}

#[derive(Debug, Default)]
struct Tables {
    dimensions: BTreeSet<String>,
    units: HashMap<String, Unit>,
    kinds: BTreeMap<String, DimensionVector>,
    /// Canonical dimension name -> first kind registered for it
    kind_names: HashMap<String, String>,
}

impl Tables {
    /// Effective scale and dimension of a possibly prefixed token
    fn resolve(&self, token: &str) -> Option<(f64, DimensionVector)> {
        prefix_splits(token).find_map(|(multiplier, symbol)| {
            self.units
                .get(symbol)
                .map(|unit| (multiplier * unit.scale, unit.dimension.clone()))
        })
    }
}

/// Registry of dimensions, units and named kinds
#[derive(Debug, Default)]
pub struct Registry {
    tables: RwLock<Tables>,
}

impl Registry {
    /// Registry with no dimensions, units or kinds
    pub fn empty() -> Self {
        Registry::default()
    }

    /// Fresh registry seeded with the SI system
    ///
    /// # Panics
    ///
    /// If the built-in SI tables are inconsistent, which [`Registry::try_si`]
    /// reports as an error instead.
    pub fn si() -> Self {
        Registry::try_si().expect("built-in SI tables define every symbol once")
    }

    /// Fresh registry seeded with the SI system, failing on the first bad entry
    pub fn try_si() -> Result<Self, UnitError> {
        let registry = Registry::empty();
        registry.seed_si().map_err(|err| {
            error!(error = %err, code = err.code(), "failed to seed SI registry");
            err
        })?;
        Ok(registry)
    }

    /// The shared SI registry
    pub fn global() -> &'static Registry {
        &SI
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        // Tables are append-only, a panic mid-definition cannot leave them torn
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn seed_si(&self) -> Result<(), UnitError> {
        for symbol in SI_DIMENSIONS {
            self.create_dimension(symbol)?;
        }

        for (name, canonical) in SI_KINDS {
            let dimension: DimensionVector = canonical.parse()?;
            self.define_kind(name, dimension)?;
        }

        // Coherent base units; the kilogram is the reference for mass
        self.define_scaled("m", 1.0, DimensionVector::base("L"))?;
        self.define_scaled("s", 1.0, DimensionVector::base("T"))?;
        self.define_scaled("g", 1e-3, DimensionVector::base("M"))?;
        self.define_scaled("A", 1.0, DimensionVector::base("I"))?;
        self.define_scaled("K", 1.0, DimensionVector::base("Θ"))?;
        self.define_scaled("mol", 1.0, DimensionVector::base("N"))?;
        self.define_scaled("cd", 1.0, DimensionVector::base("J"))?;
        self.define_scaled("rad", 1.0, DimensionVector::base("Φ"))?;
        self.define_scaled("deg", PI / 180.0, DimensionVector::base("Φ"))?;

        let defined = self.define_units(SI_DERIVED_UNITS.iter().copied())?;
        debug!(derived = defined, "seeded SI registry");
        Ok(())
    }

    // ========== Dimensions ==========

    /// Register a new base dimension symbol and return its unit vector
    pub fn create_dimension(&self, symbol: &str) -> Result<DimensionVector, UnitError> {
        check_symbol(symbol).map_err(|reason| UnitError::InvalidSymbol {
            symbol: symbol.to_string(),
            reason,
        })?;

        let mut tables = self.write();
        if !tables.dimensions.insert(symbol.to_string()) {
            return Err(UnitError::SymbolCollision(symbol.to_string()));
        }
        debug!(symbol, "created dimension");
        Ok(DimensionVector::base(symbol))
    }

    pub fn is_dimension(&self, symbol: &str) -> bool {
        self.read().dimensions.contains(symbol)
    }

    /// Registered base dimension symbols, sorted
    pub fn dimensions(&self) -> Vec<String> {
        self.read().dimensions.iter().cloned().collect()
    }

    // ========== Units ==========

    /// Define a unit from a quantity or a literal over existing units
    pub fn define_unit<'a>(
        &self,
        symbol: &str,
        definition: impl Into<Definition<'a>>,
    ) -> Result<(), UnitError> {
        // Literals are resolved before the write lock is taken
        let quantity = match definition.into() {
            Definition::Quantity(quantity) => quantity,
            Definition::Literal(literal) => self.parse(literal)?,
        };
        let (scale, dimension) = quantity.into_parts();
        self.define_scaled(symbol, scale, dimension)
    }

    /// Define a unit from a raw (scale, dimension) pair
    pub fn define_scaled(
        &self,
        symbol: &str,
        scale: f64,
        dimension: DimensionVector,
    ) -> Result<(), UnitError> {
        check_symbol(symbol).map_err(|reason| UnitError::InvalidSymbol {
            symbol: symbol.to_string(),
            reason,
        })?;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(UnitError::InvalidScale { symbol: symbol.to_string(), scale });
        }

        let mut tables = self.write();
        if tables.resolve(symbol).is_some() {
            return Err(UnitError::DuplicateDefinition(symbol.to_string()));
        }

        // Every prefixed spelling of the new symbol must still be unclaimed
        let collisions: Vec<String> = PREFIXES
            .iter()
            .map(|(prefix, _)| format!("{}{}", prefix, symbol))
            .filter(|candidate| tables.resolve(candidate).is_some())
            .collect();
        if !collisions.is_empty() {
            return Err(UnitError::AmbiguousDefinition {
                symbol: symbol.to_string(),
                collisions,
            });
        }

        debug!(symbol, scale, dimension = %dimension, "defined unit");
        tables
            .units
            .insert(symbol.to_string(), Unit::new(symbol, scale, dimension));
        Ok(())
    }

    /// Define several units in order
    ///
    /// Not transactional: the first failure is returned and every unit
    /// defined before it stays registered. Returns the number defined.
    pub fn define_units<'a, I, D>(&self, definitions: I) -> Result<usize, UnitError>
    where
        I: IntoIterator<Item = (&'a str, D)>,
        D: Into<Definition<'a>>,
    {
        let mut defined = 0;
        for (symbol, definition) in definitions {
            if let Err(err) = self.define_unit(symbol, definition) {
                warn!(symbol, defined, error = %err, "unit batch stopped");
                return Err(err);
            }
            defined += 1;
        }
        Ok(defined)
    }

    /// Define units from a JSON table `[{"symbol": .., "definition": ..}]`
    pub fn load_json(&self, text: &str) -> Result<usize, UnitError> {
        let entries: Vec<UnitEntry> =
            serde_json::from_str(text).map_err(|e| UnitError::InvalidTable(e.to_string()))?;
        debug!(entries = entries.len(), "loading unit table");
        self.define_units(
            entries
                .iter()
                .map(|entry| (entry.symbol.as_str(), entry.definition.as_str())),
        )
    }

    /// The unit registered under exactly `symbol` (no prefix resolution)
    pub fn unit(&self, symbol: &str) -> Option<Unit> {
        self.read().units.get(symbol).cloned()
    }

    /// Registered unit symbols, sorted
    pub fn unit_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.read().units.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Effective scale and dimension of a token, prefixes included
    ///
    /// Prefixes are tried longest first, the bare symbol last.
    pub fn lookup(&self, token: &str) -> Result<(f64, DimensionVector), UnitError> {
        self.read()
            .resolve(token)
            .ok_or_else(|| UnitError::UnknownUnit(token.to_string()))
    }

    /// Parse a quantity literal such as `"9.81m/s2"`
    pub fn parse(&self, literal: &str) -> Result<Quantity<f64>, UnitError> {
        parse_quantity(self, literal)
    }

    // ========== Kinds ==========

    /// Name a dimension, e.g. `Velocity` for `[L/T]`
    pub fn define_kind(&self, name: &str, dimension: DimensionVector) -> Result<Kind, UnitError> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(UnitError::InvalidSymbol {
                symbol: name.to_string(),
                reason: "kind names are non-empty and carry no whitespace",
            });
        }

        let mut tables = self.write();
        if tables.kinds.contains_key(name) {
            return Err(UnitError::DuplicateDefinition(name.to_string()));
        }
        tables
            .kind_names
            .entry(dimension.name())
            .or_insert_with(|| name.to_string());
        tables.kinds.insert(name.to_string(), dimension.clone());
        debug!(kind = name, dimension = %dimension, "defined kind");
        Ok(Kind::new(name, dimension))
    }

    pub fn kind(&self, name: &str) -> Option<Kind> {
        self.read()
            .kinds
            .get(name)
            .map(|dimension| Kind::new(name, dimension.clone()))
    }

    /// First kind registered for `dimension`
    pub fn kind_of(&self, dimension: &DimensionVector) -> Option<Kind> {
        let tables = self.read();
        let name = tables.kind_names.get(&dimension.name())?;
        Some(Kind::new(name, dimension.clone()))
    }

    /// Registered kind names, sorted
    pub fn kind_names(&self) -> Vec<String> {
        self.read().kinds.keys().cloned().collect()
    }
}
