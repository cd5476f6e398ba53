//! Discovery pass over a [`ServiceDescriptor`], run before type creation:
//! interfaces and their implementors, federation entities, and executable directive classes.

use crate::descriptor::DefinitionKind;
use crate::descriptor::DirectiveClass;
use crate::descriptor::ServiceDescriptor;
use crate::descriptor::TypeDefinition;
use indexmap::IndexMap;
use indexmap::IndexSet;

#[derive(Debug, Default)]
pub struct InterfaceEntityFinder<'a> {
    /// interface name -> names of definitions that include it
    implementations: IndexMap<&'a str, IndexSet<&'a str>>,
    entities: IndexMap<&'a str, &'a TypeDefinition>,
    /// directive name -> class defining it
    executable_directives: IndexMap<&'a str, &'a DirectiveClass>,
}

impl<'a> InterfaceEntityFinder<'a> {
    pub fn new(service: &'a ServiceDescriptor) -> Self {
        let mut finder = Self::default();
        for definition in service.definitions.values() {
            finder.find_interfaces(service, definition);
            if definition.entity.is_some() {
                finder.entities.insert(&definition.name, definition);
            }
        }
        for class in &service.directives {
            if class.includes_directive {
                finder
                    .executable_directives
                    .entry(class.directive_name())
                    .or_insert(class);
            }
        }
        tracing::trace!(
            interfaces = finder.implementations.len(),
            entities = finder.entities.len(),
            directives = finder.executable_directives.len(),
            "discovered service symbols"
        );
        finder
    }

    fn find_interfaces(&mut self, service: &'a ServiceDescriptor, definition: &'a TypeDefinition) {
        let Some(object) = definition.object() else {
            return;
        };
        for inclusion in &object.inclusions {
            let included_is_service_object = service
                .get_definition(inclusion)
                .is_some_and(|included| matches!(included.kind, DefinitionKind::ServiceObject(_)));
            if !included_is_service_object {
                continue;
            }
            self.implementations
                .entry(inclusion)
                .or_default()
                .insert(&definition.name);
        }
    }

    /// Whether some service class or service object type includes `name`
    pub fn is_possible_interface(&self, name: &str) -> bool {
        self.implementations.contains_key(name)
    }

    pub fn implementations(&self, interface: &str) -> impl Iterator<Item = &'a str> + '_ {
        self.implementations
            .get(interface)
            .into_iter()
            .flat_map(|names| names.iter().copied())
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.implementations.keys().copied()
    }

    pub fn entities(&self) -> impl Iterator<Item = (&'a str, &'a TypeDefinition)> + '_ {
        self.entities.iter().map(|(name, def)| (*name, *def))
    }

    pub fn executable_directives(&self) -> impl Iterator<Item = (&'a str, &'a DirectiveClass)> + '_ {
        self.executable_directives
            .iter()
            .map(|(name, class)| (*name, *class))
    }
}
