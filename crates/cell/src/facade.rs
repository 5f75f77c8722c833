//! The entry point: bootstraps the registry and turns sequences into IDs.

use std::{collections::HashSet, sync::Arc};

use crate::{
    BufferManager, CODE_LEN, Cell, CellConfig, CellSpec, Config, Error, LocalClock,
    RegistryRecord, RegistryStore, Result, TimeSource,
};

/// A kind of entity that needs IDs.
///
/// `name` keys the counter in the registry; `code` is the three digit
/// prefix written into every ID of this category.
pub trait Category {
    fn name(&self) -> &str;
    fn code(&self) -> &str;
}

impl<C: Category + ?Sized> Category for &C {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn code(&self) -> &str {
        (**self).code()
    }
}

/// An owned `(name, code)` pair, the form categories are declared in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CategoryDescriptor {
    pub name: String,
    pub code: String,
}

impl CategoryDescriptor {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }
}

impl Category for CategoryDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn code(&self) -> &str {
        &self.code
    }
}

/// Generates fixed-width IDs for a declared set of categories.
///
/// Construct it with the store, the configuration and the categories, call
/// [`start`](Self::start) once, then share it (it is `Sync`) across the
/// threads that call [`generate_id`](Self::generate_id).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use cell::{CategoryDescriptor, CellFacade, Config, MemoryRegistryStore};
///
/// let order = CategoryDescriptor::new("order", "101");
/// let facade = CellFacade::new(
///     Arc::new(MemoryRegistryStore::new()),
///     Config::default(),
///     [order.clone()],
/// )
/// .unwrap();
/// facade.start().unwrap();
///
/// let id = facade.generate_id(&order).unwrap();
/// assert_eq!(id.len(), 24);
/// assert_eq!(&id[8..11], "101");
/// assert!(id.ends_with("0000000000"));
/// ```
pub struct CellFacade<S, T = LocalClock>
where
    S: RegistryStore + 'static,
    T: TimeSource,
{
    store: Arc<S>,
    manager: BufferManager<S>,
    cell: CellConfig,
    spec: CellSpec,
    categories: Vec<CategoryDescriptor>,
    time: T,
}

impl<S> CellFacade<S, LocalClock>
where
    S: RegistryStore + 'static,
{
    /// Builds a facade stamping IDs with the local system clock.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if `config` is invalid, or a category has a
    /// blank name, a code that is not exactly three characters, or a name or
    /// code that is declared twice.
    pub fn new(
        store: Arc<S>,
        config: Config,
        categories: impl IntoIterator<Item = CategoryDescriptor>,
    ) -> Result<Self> {
        Self::with_time_source(store, config, categories, LocalClock)
    }
}

impl<S, T> CellFacade<S, T>
where
    S: RegistryStore + 'static,
    T: TimeSource,
{
    /// Like [`new`](CellFacade::new) with a custom [`TimeSource`].
    ///
    /// # Errors
    ///
    /// See [`new`](CellFacade::new).
    pub fn with_time_source(
        store: Arc<S>,
        config: Config,
        categories: impl IntoIterator<Item = CategoryDescriptor>,
        time: T,
    ) -> Result<Self> {
        config.validate()?;
        let categories: Vec<CategoryDescriptor> = categories.into_iter().collect();
        validate_categories(&categories)?;

        let manager = BufferManager::new(Arc::clone(&store), config.buffer)?;
        Ok(Self {
            store,
            manager,
            spec: CellSpec::new(config.cell.pattern),
            cell: config.cell,
            categories,
            time,
        })
    }

    /// Verifies the registry, registers missing categories and primes the
    /// buffers. Must complete before IDs are served; any error is fatal.
    ///
    /// Each category is registered in its own transaction with a locking
    /// read, so facades in several processes can start against the same
    /// store at once without double-inserting.
    ///
    /// # Errors
    ///
    /// - [`Error::Persistence`] if the registry table is missing, the store
    ///   fails, or the registry ends up with no names.
    /// - [`Error::Closed`] after [`close`](Self::close).
    pub fn start(&self) -> Result<()> {
        if !self.store.exists_table()? {
            return Err(Error::persistence("registry table does not exist"));
        }
        self.register_categories()?;
        self.manager.init_cache()?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            pattern = %self.spec.pattern(),
            data_center = self.cell.data_center,
            machine = self.cell.machine,
            "cell started"
        );
        Ok(())
    }

    /// Generates the next ID for `category`.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] if the category name is blank.
    /// - Any error of [`BufferManager::get_sequence`].
    /// - [`Error::Validation`] if the category code or date cannot be
    ///   encoded.
    pub fn generate_id(&self, category: &impl Category) -> Result<String> {
        let name = category.name();
        if name.trim().is_empty() {
            return Err(Error::configuration("category name is blank"));
        }

        let sequence = self.manager.get_sequence(name)?;
        let cell = Cell::builder()
            .code(category.code())
            .date(self.time.now())
            .data_center(self.cell.data_center)
            .machine(self.cell.machine)
            .sequence(sequence)
            .build()?;

        self.spec.encode(&cell).map_err(|e| {
            #[cfg(feature = "tracing")]
            tracing::warn!(name, error = %e, "cell encoding failed");
            Error::Validation(e)
        })
    }

    /// The declared categories.
    pub fn categories(&self) -> &[CategoryDescriptor] {
        &self.categories
    }

    pub fn manager(&self) -> &BufferManager<S> {
        &self.manager
    }

    /// Stops background refills. Later requests fail with [`Error::Closed`].
    pub fn close(&self) {
        self.manager.close();
    }

    fn register_categories(&self) -> Result<()> {
        if self.categories.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::info!("no categories declared; skipping registration");
            return Ok(());
        }

        for category in &self.categories {
            self.store.transaction(&mut |tx| {
                if tx.lock_query_by_name(&category.name)?.is_none() {
                    #[cfg(feature = "tracing")]
                    tracing::info!(name = %category.name, "registering category");
                    tx.save(RegistryRecord::init(category.name.clone(), &self.cell))?;
                }
                Ok(())
            })?;
        }

        #[cfg(feature = "tracing")]
        tracing::info!(count = self.categories.len(), "category registration finished");
        Ok(())
    }
}

impl<S, T> core::fmt::Debug for CellFacade<S, T>
where
    S: RegistryStore + 'static,
    T: TimeSource,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CellFacade")
            .field("cell", &self.cell)
            .field("categories", &self.categories)
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

fn validate_categories(categories: &[CategoryDescriptor]) -> Result<()> {
    let mut names = HashSet::with_capacity(categories.len());
    let mut codes = HashSet::with_capacity(categories.len());

    for category in categories {
        if category.name.trim().is_empty() {
            return Err(Error::configuration("category name is blank"));
        }
        let code = category.code.as_bytes();
        if code.len() != CODE_LEN || !code.iter().all(u8::is_ascii_digit) {
            return Err(Error::configuration(format!(
                "category `{}` code `{}` must be {CODE_LEN} ASCII digits",
                category.name, category.code
            )));
        }
        if !names.insert(category.name.as_str()) {
            return Err(Error::configuration(format!(
                "category `{}` is declared twice",
                category.name
            )));
        }
        if !codes.insert(category.code.as_str()) {
            return Err(Error::configuration(format!(
                "category code `{}` is declared twice",
                category.code
            )));
        }
    }
    Ok(())
}
